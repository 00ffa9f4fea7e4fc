use std::{fs::File, path::Path, sync::Arc};

use arrow::{
    compute::{cast, concat_batches},
    csv::{ReaderBuilder, reader::Format},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use snafu::{OptionExt, ResultExt};

use crate::error::{ArrowSnafu, CliResult, CsvMissingSnafu, UnknownCategoricalSnafu};

/// Rows sampled for schema inference.
const INFER_MAX_RECORDS: usize = 1_000;

fn open_csv(path: &Path) -> CliResult<File> {
    File::open(path).context(CsvMissingSnafu {
        path: path.display().to_string(),
    })
}

/// Read a headered CSV into one batch, inferring column types.
pub fn read_csv(path: &Path) -> CliResult<RecordBatch> {
    let format = Format::default().with_header(true);
    let mut file = open_csv(path)?;
    let (schema, _) = format
        .infer_schema(&mut file, Some(INFER_MAX_RECORDS))
        .context(ArrowSnafu {
            action: "inferring CSV schema",
        })?;
    let schema: SchemaRef = Arc::new(schema);

    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .build(open_csv(path)?)
        .context(ArrowSnafu {
            action: "opening CSV reader",
        })?;
    let batches = reader.collect::<Result<Vec<_>, _>>().context(ArrowSnafu {
        action: "reading CSV",
    })?;

    concat_batches(&schema, &batches).context(ArrowSnafu {
        action: "combining CSV batches",
    })
}

/// Dictionary-encode the named columns of `batch` with int32 keys.
pub fn dictionary_encode(batch: &RecordBatch, columns: &[String]) -> CliResult<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut arrays = batch.columns().to_vec();

    for name in columns {
        let idx = schema
            .index_of(name)
            .ok()
            .context(UnknownCategoricalSnafu {
                column: name.as_str(),
            })?;
        let value_type = fields[idx].data_type().clone();
        if matches!(value_type, DataType::Dictionary(..)) {
            continue;
        }
        let target = DataType::Dictionary(Box::new(DataType::Int32), Box::new(value_type));
        arrays[idx] = cast(&arrays[idx], &target).context(ArrowSnafu {
            action: format!("dictionary-encoding column '{name}'"),
        })?;
        fields[idx] = fields[idx].clone().with_data_type(target);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context(ArrowSnafu {
        action: "rebuilding batch",
    })
}
