//! Column codec: one named column to files under a store directory, and
//! back.
//!
//! The physical representation is chosen by the column's [`DType`]:
//!
//! - [`DType::Text`] → `<col>.csv`, see the `text` submodule
//! - [`DType::Numeric`] → `<col>.bin`, see the `array` submodule
//! - [`DType::Category`] → `<col>.bin` (int32 codes) plus
//!   `<col>.meta.json`, see the `categorical` submodule
//!
//! Encoding and decoding are pure per-column functions with no shared
//! state, so the store runs them on a worker pool.

mod array;
mod categorical;
mod text;

use std::path::Path;

use log::debug;

use crate::{
    dtype::DType,
    error::{StoreResult, UnsupportedSchemaSnafu},
    options::WriteOptions,
    storage::layout,
    table::{Column, ColumnData},
};

fn ensure_usable_name(name: &str) -> StoreResult<()> {
    if let Some(problem) = layout::column_name_problem(name) {
        return UnsupportedSchemaSnafu {
            reason: format!("{problem}: {name:?}"),
        }
        .fail();
    }
    Ok(())
}

/// Write `column` into the store directory `dir`.
///
/// `dir` must already exist. Files for this column are replaced if present.
pub fn encode_column(column: &Column, dir: &Path, options: &WriteOptions) -> StoreResult<()> {
    let name = column.name();
    ensure_usable_name(name)?;
    debug!(
        "encoding column '{name}' ({}, {} rows)",
        column.dtype(),
        column.len()
    );

    match column.data() {
        ColumnData::Text(values) => {
            text::write_text(&dir.join(layout::text_rel_path(name)), name, values)
        }
        ColumnData::Numeric(values) => array::write_numeric(
            &dir.join(layout::array_rel_path(name)),
            values,
            options.compression_level,
        ),
        ColumnData::Categorical(values) => {
            categorical::write_categorical(dir, name, values, options.compression_level)
        }
    }
}

/// Read column `name`, declared as `dtype`, from the store directory `dir`.
///
/// Dispatch is on `dtype` alone. Errors:
/// - [`crate::StoreError::NotFound`] if a file the dtype calls for is absent.
/// - [`crate::StoreError::CorruptData`] if a file cannot be decoded.
/// - [`crate::StoreError::SchemaMismatch`] if decodable content disagrees
///   with `dtype` (array element type, label types, code range).
pub fn decode_column(name: &str, dtype: &DType, dir: &Path) -> StoreResult<Column> {
    ensure_usable_name(name)?;
    debug!("decoding column '{name}' as {dtype}");

    let data = match dtype {
        DType::Text => {
            ColumnData::Text(text::read_text(&dir.join(layout::text_rel_path(name)), name)?)
        }
        DType::Numeric(numeric_type) => ColumnData::Numeric(array::read_numeric(
            &dir.join(layout::array_rel_path(name)),
            name,
            numeric_type,
        )?),
        DType::Category => ColumnData::Categorical(categorical::read_categorical(dir, name)?),
    };
    Ok(Column::new(name, data))
}
