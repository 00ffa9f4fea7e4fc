//! Categorical columns: codes in `<col>.bin`, labels in `<col>.meta.json`.
//!
//! The metadata file is a small JSON object:
//!
//! ```json
//! {"categories": ["a", "b"], "ordered": false, "categories_dtype": "text"}
//! ```
//!
//! `categories_dtype` pins the label subtype. Files without it are accepted
//! and the subtype is inferred from the JSON values.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use snafu::prelude::*;

use crate::{
    codec::array,
    dtype::{DType, NumericType},
    error::{
        CorruptDataSnafu, SchemaMismatchSnafu, StoreError, StoreResult, UnsupportedSchemaSnafu,
        map_storage_error,
    },
    storage::{self, layout},
    table::{Categorical, CategoryLabels, NumericValues, first_invalid_code},
};

#[derive(Debug, Serialize, Deserialize)]
struct CategoryMeta {
    categories: Vec<Value>,
    ordered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    categories_dtype: Option<String>,
}

fn float_label(column: &str, x: f64) -> StoreResult<Value> {
    Number::from_f64(x).map(Value::Number).with_context(|| UnsupportedSchemaSnafu {
        reason: format!("column '{column}' has a non-finite category label ({x})"),
    })
}

fn numeric_labels_to_json(column: &str, values: &NumericValues) -> StoreResult<Vec<Value>> {
    Ok(match values {
        NumericValues::Bool(v) => v.iter().map(|&x| Value::Bool(x)).collect(),
        NumericValues::Int8(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::Int16(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::Int32(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::Int64(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::UInt8(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::UInt16(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::UInt32(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::UInt64(v) => v.iter().map(|&x| Value::from(x)).collect(),
        NumericValues::Float32(v) => v
            .iter()
            .map(|&x| float_label(column, f64::from(x)))
            .collect::<StoreResult<_>>()?,
        NumericValues::Float64(v) => v
            .iter()
            .map(|&x| float_label(column, x))
            .collect::<StoreResult<_>>()?,
        NumericValues::Timestamp { values, .. } => {
            values.iter().map(|&x| Value::from(x)).collect()
        }
    })
}

/// Write the codes array and the label metadata for `column` under `dir`.
pub(crate) fn write_categorical(
    dir: &Path,
    column: &str,
    values: &Categorical,
    level: i32,
) -> StoreResult<()> {
    let (categories, label_dtype) = match values.categories() {
        CategoryLabels::Text(labels) => (
            labels.iter().cloned().map(Value::String).collect(),
            DType::Text,
        ),
        CategoryLabels::Numeric(labels) => (
            numeric_labels_to_json(column, labels)?,
            DType::Numeric(labels.numeric_type()),
        ),
    };
    let meta = CategoryMeta {
        categories,
        ordered: values.ordered(),
        categories_dtype: Some(label_dtype.to_string()),
    };
    let json = serde_json::to_vec_pretty(&meta).map_err(|e| {
        UnsupportedSchemaSnafu {
            reason: format!("cannot serialize categories of column '{column}': {e}"),
        }
        .build()
    })?;

    array::write_array(
        &dir.join(layout::array_rel_path(column)),
        values.codes(),
        level,
    )?;
    storage::write_atomic(&dir.join(layout::category_meta_rel_path(column)), &json)
        .map_err(map_storage_error)
}

/// Guess the label subtype of metadata written without `categories_dtype`.
fn infer_label_dtype(column: &str, labels: &[Value]) -> StoreResult<DType> {
    if labels.iter().all(Value::is_string) {
        return Ok(DType::Text);
    }
    let numeric = if labels.iter().all(Value::is_boolean) {
        NumericType::Bool
    } else if labels.iter().all(Value::is_i64) {
        NumericType::Int64
    } else if labels.iter().all(Value::is_u64) {
        NumericType::UInt64
    } else if labels.iter().all(Value::is_number) {
        NumericType::Float64
    } else {
        return SchemaMismatchSnafu {
            column,
            details: "category labels mix JSON types".to_string(),
        }
        .fail();
    };
    Ok(DType::Numeric(numeric))
}

fn convert_labels<T>(
    column: &str,
    labels: &[Value],
    label_dtype: &DType,
    convert: impl Fn(&Value) -> Option<T>,
) -> StoreResult<Vec<T>> {
    labels
        .iter()
        .enumerate()
        .map(|(i, v)| {
            convert(v).with_context(|| SchemaMismatchSnafu {
                column,
                details: format!("category {i} ({v}) is not a valid {label_dtype} label"),
            })
        })
        .collect()
}

fn int_label<T: TryFrom<i64>>(v: &Value) -> Option<T> {
    v.as_i64().and_then(|x| T::try_from(x).ok())
}

fn uint_label<T: TryFrom<u64>>(v: &Value) -> Option<T> {
    v.as_u64().and_then(|x| T::try_from(x).ok())
}

fn labels_from_json(
    column: &str,
    labels: &[Value],
    label_dtype: &DType,
) -> StoreResult<CategoryLabels> {
    let numeric = match label_dtype {
        DType::Text => {
            let text = convert_labels(column, labels, label_dtype, |v| {
                v.as_str().map(str::to_string)
            })?;
            return Ok(CategoryLabels::Text(text));
        }
        DType::Numeric(t) => t,
        DType::Category => {
            return SchemaMismatchSnafu {
                column,
                details: "category labels cannot themselves be categorical".to_string(),
            }
            .fail();
        }
    };

    macro_rules! labels {
        ($convert:expr) => {
            convert_labels(column, labels, label_dtype, $convert)?
        };
    }

    let values = match numeric {
        NumericType::Bool => NumericValues::Bool(labels!(Value::as_bool)),
        NumericType::Int8 => NumericValues::Int8(labels!(int_label)),
        NumericType::Int16 => NumericValues::Int16(labels!(int_label)),
        NumericType::Int32 => NumericValues::Int32(labels!(int_label)),
        NumericType::Int64 => NumericValues::Int64(labels!(Value::as_i64)),
        NumericType::UInt8 => NumericValues::UInt8(labels!(uint_label)),
        NumericType::UInt16 => NumericValues::UInt16(labels!(uint_label)),
        NumericType::UInt32 => NumericValues::UInt32(labels!(uint_label)),
        NumericType::UInt64 => NumericValues::UInt64(labels!(Value::as_u64)),
        // f32 labels were widened losslessly on write.
        NumericType::Float32 => {
            NumericValues::Float32(labels!(|v: &Value| v.as_f64().map(|x| x as f32)))
        }
        NumericType::Float64 => NumericValues::Float64(labels!(Value::as_f64)),
        NumericType::Timestamp { unit, timezone } => NumericValues::Timestamp {
            unit: *unit,
            timezone: timezone.clone(),
            values: labels!(Value::as_i64),
        },
    };
    Ok(CategoryLabels::Numeric(values))
}

/// Read the codes and labels of `column` from `dir`.
pub(crate) fn read_categorical(dir: &Path, column: &str) -> StoreResult<Categorical> {
    let meta_path = dir.join(layout::category_meta_rel_path(column));
    let bytes = storage::read_all_bytes(&meta_path).map_err(map_storage_error)?;
    let corrupt = |details: String| -> StoreError {
        CorruptDataSnafu {
            path: meta_path.display().to_string(),
            details,
        }
        .build()
    };

    let meta: CategoryMeta = serde_json::from_slice(&bytes)
        .map_err(|e| corrupt(format!("invalid category metadata: {e}")))?;

    let label_dtype = match meta.categories_dtype.as_deref() {
        Some(tag) => tag
            .parse::<DType>()
            .map_err(|e| corrupt(e.to_string()))?,
        None => infer_label_dtype(column, &meta.categories)?,
    };
    let categories = labels_from_json(column, &meta.categories, &label_dtype)?;
    if let Some(pos) = categories.first_duplicate() {
        return Err(corrupt(format!(
            "category at position {pos} repeats an earlier label"
        )));
    }

    let codes: Vec<i32> = array::read_array(&dir.join(layout::array_rel_path(column)), column)?;
    if let Some((row, code)) = first_invalid_code(&codes, categories.len()) {
        return SchemaMismatchSnafu {
            column,
            details: format!(
                "code {code} at row {row} is out of range for {} categories",
                categories.len()
            ),
        }
        .fail();
    }

    Ok(Categorical::from_validated_parts(
        codes,
        categories,
        meta.ordered,
    ))
}
