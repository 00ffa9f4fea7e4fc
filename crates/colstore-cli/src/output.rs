use std::io::Write;

use arrow::{
    csv::WriterBuilder,
    json::LineDelimitedWriter,
    record_batch::RecordBatch,
    util::display::{ArrayFormatter, FormatOptions},
};
use snafu::ResultExt;
use tabled::{builder::Builder, settings::Style};

use crate::error::{ArrowSnafu, CliResult, OutputSnafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Jsonl,
}

pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let mut builder = Builder::default();
    builder.push_record(columns);
    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Cell text for every row of `batch`; nulls render as `null`.
fn batch_rows(batch: &RecordBatch) -> CliResult<Vec<Vec<String>>> {
    let options = FormatOptions::default().with_null("null");
    let formatters = batch
        .columns()
        .iter()
        .map(|array| ArrayFormatter::try_new(array.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()
        .context(ArrowSnafu {
            action: "formatting preview",
        })?;

    Ok((0..batch.num_rows())
        .map(|row| formatters.iter().map(|f| f.value(row).to_string()).collect())
        .collect())
}

/// Write `batch` to `out` in `format`. `total_rows` is the row count before
/// any `--max-rows` truncation.
pub fn write_batch<W: Write>(
    batch: &RecordBatch,
    format: OutputFormat,
    total_rows: usize,
    out: &mut W,
) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            let columns: Vec<String> = batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect();
            let rendered = render_table(&columns, &batch_rows(batch)?);
            if !rendered.is_empty() {
                writeln!(out, "{rendered}").context(OutputSnafu)?;
            }
            writeln!(out, "total_rows: {total_rows}").context(OutputSnafu)?;
        }
        OutputFormat::Csv => {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut *out);
            writer.write(batch).context(ArrowSnafu {
                action: "writing CSV",
            })?;
        }
        OutputFormat::Jsonl => {
            let mut writer = LineDelimitedWriter::new(&mut *out);
            writer.write_batches(&[batch]).context(ArrowSnafu {
                action: "writing JSON lines",
            })?;
            writer.finish().context(ArrowSnafu {
                action: "writing JSON lines",
            })?;
        }
    }
    out.flush().context(OutputSnafu)
}
