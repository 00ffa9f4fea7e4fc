//! Text columns as single-column CSV (`<col>.csv`).
//!
//! One record per row, no header. Missing values are empty fields; the CSV
//! writer quotes values that contain the delimiter, a quote or a line break,
//! and writes a lone empty field as `""` so the record is not lost.
//!
//! An empty string and a missing value share the same on-disk form, and both
//! decode as missing.

use std::{path::Path, sync::Arc};

use arrow::{
    array::{AsArray, StringArray},
    csv::{ReaderBuilder, WriterBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use snafu::prelude::*;

use crate::{
    error::{ArrowSnafu, CorruptDataSnafu, StoreResult, map_storage_error},
    storage,
};

fn text_schema(column: &str) -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new(column, DataType::Utf8, true)]))
}

/// Write `values` for `column` to `path`.
pub(crate) fn write_text(path: &Path, column: &str, values: &[Option<String>]) -> StoreResult<()> {
    let array: StringArray = values.iter().map(Option::as_deref).collect();
    let batch = RecordBatch::try_new(text_schema(column), vec![Arc::new(array)]).context(
        ArrowSnafu {
            action: format!("building text batch for column '{column}'"),
        },
    )?;

    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(false).build(&mut buf);
        writer.write(&batch).context(ArrowSnafu {
            action: format!("writing text column '{column}'"),
        })?;
    }

    storage::write_atomic(path, &buf).map_err(map_storage_error)
}

/// Read the text values of `column` from `path`.
pub(crate) fn read_text(path: &Path, column: &str) -> StoreResult<Vec<Option<String>>> {
    let file = storage::open_reader(path).map_err(map_storage_error)?;
    let corrupt = |e: arrow::error::ArrowError| {
        CorruptDataSnafu {
            path: path.display().to_string(),
            details: format!("unreadable text column: {e}"),
        }
        .build()
    };

    let reader = ReaderBuilder::new(text_schema(column))
        .with_header(false)
        .build_buffered(file)
        .map_err(corrupt)?;

    let mut values = Vec::new();
    for batch in reader {
        let batch = batch.map_err(corrupt)?;
        let strings = batch.column(0).as_string::<i32>();
        values.extend(strings.iter().map(|v| v.map(str::to_string)));
    }
    Ok(values)
}
