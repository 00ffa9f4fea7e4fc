//! Conversion between [`Table`] and Arrow [`RecordBatch`].
//!
//! Mapping:
//!
//! | Arrow                                  | colstore                      |
//! |----------------------------------------|-------------------------------|
//! | `Utf8`, `LargeUtf8`                    | text                          |
//! | `Boolean`, `Int*`, `UInt*`, `Float32/64` | numeric (no nulls allowed)  |
//! | `Timestamp(unit, tz)`                  | timestamp, null ↔ NaT         |
//! | `Dictionary(int key, values)`          | categorical, null key ↔ -1    |
//!
//! Dictionary orderedness travels in the field metadata under
//! [`ORDERED_METADATA_KEY`]. Everything else is rejected with
//! [`crate::StoreError::UnsupportedSchema`].

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, AsArray, BooleanArray, DictionaryArray, Int32Array, PrimitiveArray,
        StringArray,
    },
    compute::cast,
    datatypes::{
        ArrowPrimitiveType, DataType, Field, Float32Type, Float64Type, Int8Type, Int16Type,
        Int32Type, Int64Type, Schema, TimeUnit as ArrowTimeUnit, TimestampMicrosecondType,
        TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
        UInt16Type, UInt32Type, UInt64Type,
    },
    record_batch::{RecordBatch, RecordBatchOptions},
};
use snafu::prelude::*;

use crate::{
    dtype::TimeUnit,
    error::{ArrowSnafu, StoreResult, UnsupportedSchemaSnafu},
    table::{
        Categorical, CategoryLabels, Column, ColumnData, MISSING_CODE, NAT, NumericValues, Table,
    },
};

/// Field metadata key holding `"true"` for ordered categoricals.
pub const ORDERED_METADATA_KEY: &str = "colstore.ordered";

fn time_unit_from_arrow(unit: ArrowTimeUnit) -> TimeUnit {
    match unit {
        ArrowTimeUnit::Second => TimeUnit::Second,
        ArrowTimeUnit::Millisecond => TimeUnit::Millisecond,
        ArrowTimeUnit::Microsecond => TimeUnit::Microsecond,
        ArrowTimeUnit::Nanosecond => TimeUnit::Nanosecond,
    }
}

fn dense<T: ArrowPrimitiveType>(column: &str, array: &dyn Array) -> StoreResult<Vec<T::Native>> {
    ensure!(
        array.null_count() == 0,
        UnsupportedSchemaSnafu {
            reason: format!(
                "column '{column}' has {} nulls; only text, timestamp and categorical columns may hold missing values",
                array.null_count()
            ),
        }
    );
    Ok(array.as_primitive::<T>().values().to_vec())
}

/// Numeric values of a primitive Arrow array, or `None` for other types.
fn numeric_from_arrow(column: &str, array: &dyn Array) -> StoreResult<Option<NumericValues>> {
    Ok(Some(match array.data_type() {
        DataType::Boolean => {
            ensure!(
                array.null_count() == 0,
                UnsupportedSchemaSnafu {
                    reason: format!("boolean column '{column}' has nulls"),
                }
            );
            NumericValues::Bool(array.as_boolean().values().iter().collect())
        }
        DataType::Int8 => NumericValues::Int8(dense::<Int8Type>(column, array)?),
        DataType::Int16 => NumericValues::Int16(dense::<Int16Type>(column, array)?),
        DataType::Int32 => NumericValues::Int32(dense::<Int32Type>(column, array)?),
        DataType::Int64 => NumericValues::Int64(dense::<Int64Type>(column, array)?),
        DataType::UInt8 => NumericValues::UInt8(dense::<UInt8Type>(column, array)?),
        DataType::UInt16 => NumericValues::UInt16(dense::<UInt16Type>(column, array)?),
        DataType::UInt32 => NumericValues::UInt32(dense::<UInt32Type>(column, array)?),
        DataType::UInt64 => NumericValues::UInt64(dense::<UInt64Type>(column, array)?),
        DataType::Float32 => NumericValues::Float32(dense::<Float32Type>(column, array)?),
        DataType::Float64 => NumericValues::Float64(dense::<Float64Type>(column, array)?),
        DataType::Timestamp(unit, timezone) => {
            let raw = cast(array, &DataType::Int64).context(ArrowSnafu {
                action: format!("reading timestamps of column '{column}'"),
            })?;
            NumericValues::Timestamp {
                unit: time_unit_from_arrow(*unit),
                timezone: timezone.as_ref().map(|tz| tz.to_string()),
                values: raw
                    .as_primitive::<Int64Type>()
                    .iter()
                    .map(|v| v.unwrap_or(NAT))
                    .collect(),
            }
        }
        _ => return Ok(None),
    }))
}

fn text_from_arrow(array: &dyn Array) -> Option<Vec<Option<String>>> {
    let owned = |v: Option<&str>| v.map(str::to_string);
    match array.data_type() {
        DataType::Utf8 => Some(array.as_string::<i32>().iter().map(owned).collect()),
        DataType::LargeUtf8 => Some(array.as_string::<i64>().iter().map(owned).collect()),
        _ => None,
    }
}

fn categorical_from_arrow(field: &Field, array: &dyn Array) -> StoreResult<Categorical> {
    let column = field.name();
    let DataType::Dictionary(key_type, value_type) = array.data_type() else {
        return UnsupportedSchemaSnafu {
            reason: format!("column '{column}' is not dictionary encoded"),
        }
        .fail();
    };
    ensure!(
        key_type.is_integer(),
        UnsupportedSchemaSnafu {
            reason: format!("column '{column}' has non-integer dictionary keys ({key_type})"),
        }
    );

    let target = DataType::Dictionary(Box::new(DataType::Int32), value_type.clone());
    let normalized = cast(array, &target).context(ArrowSnafu {
        action: format!("converting dictionary keys of column '{column}' to int32"),
    })?;
    let dict = normalized.as_dictionary::<Int32Type>();

    let values = dict.values().as_ref();
    ensure!(
        values.null_count() == 0,
        UnsupportedSchemaSnafu {
            reason: format!("column '{column}' has a null dictionary value"),
        }
    );
    let categories = match text_from_arrow(values) {
        Some(labels) => CategoryLabels::Text(labels.into_iter().flatten().collect()),
        None => match numeric_from_arrow(column, values)? {
            Some(numeric) => CategoryLabels::Numeric(numeric),
            None => {
                return UnsupportedSchemaSnafu {
                    reason: format!(
                        "column '{column}' has unsupported dictionary values ({value_type})"
                    ),
                }
                .fail();
            }
        },
    };

    let codes = dict
        .keys()
        .iter()
        .map(|k| k.unwrap_or(MISSING_CODE))
        .collect();
    let ordered = field
        .metadata()
        .get(ORDERED_METADATA_KEY)
        .is_some_and(|v| v == "true");

    Categorical::try_new(codes, categories, ordered)
}

fn column_from_arrow(field: &Field, array: &dyn Array) -> StoreResult<Column> {
    let name = field.name().as_str();
    if let Some(text) = text_from_arrow(array) {
        return Ok(Column::new(name, ColumnData::Text(text)));
    }
    if matches!(array.data_type(), DataType::Dictionary(..)) {
        return Ok(Column::categorical(name, categorical_from_arrow(field, array)?));
    }
    match numeric_from_arrow(name, array)? {
        Some(values) => Ok(Column::numeric(name, values)),
        None => UnsupportedSchemaSnafu {
            reason: format!(
                "column '{name}' has unsupported Arrow type {}",
                array.data_type()
            ),
        }
        .fail(),
    }
}

fn timestamp_array(unit: TimeUnit, timezone: Option<&str>, values: &[i64]) -> ArrayRef {
    let present = values.iter().map(|&v| (v != NAT).then_some(v));
    match unit {
        TimeUnit::Second => Arc::new(
            PrimitiveArray::<TimestampSecondType>::from_iter(present).with_timezone_opt(timezone),
        ),
        TimeUnit::Millisecond => Arc::new(
            PrimitiveArray::<TimestampMillisecondType>::from_iter(present)
                .with_timezone_opt(timezone),
        ),
        TimeUnit::Microsecond => Arc::new(
            PrimitiveArray::<TimestampMicrosecondType>::from_iter(present)
                .with_timezone_opt(timezone),
        ),
        TimeUnit::Nanosecond => Arc::new(
            PrimitiveArray::<TimestampNanosecondType>::from_iter(present)
                .with_timezone_opt(timezone),
        ),
    }
}

fn numeric_to_arrow(values: &NumericValues) -> ArrayRef {
    match values {
        NumericValues::Bool(v) => Arc::new(BooleanArray::from(v.clone())),
        NumericValues::Int8(v) => Arc::new(PrimitiveArray::<Int8Type>::from(v.clone())),
        NumericValues::Int16(v) => Arc::new(PrimitiveArray::<Int16Type>::from(v.clone())),
        NumericValues::Int32(v) => Arc::new(PrimitiveArray::<Int32Type>::from(v.clone())),
        NumericValues::Int64(v) => Arc::new(PrimitiveArray::<Int64Type>::from(v.clone())),
        NumericValues::UInt8(v) => Arc::new(PrimitiveArray::<UInt8Type>::from(v.clone())),
        NumericValues::UInt16(v) => Arc::new(PrimitiveArray::<UInt16Type>::from(v.clone())),
        NumericValues::UInt32(v) => Arc::new(PrimitiveArray::<UInt32Type>::from(v.clone())),
        NumericValues::UInt64(v) => Arc::new(PrimitiveArray::<UInt64Type>::from(v.clone())),
        NumericValues::Float32(v) => Arc::new(PrimitiveArray::<Float32Type>::from(v.clone())),
        NumericValues::Float64(v) => Arc::new(PrimitiveArray::<Float64Type>::from(v.clone())),
        NumericValues::Timestamp {
            unit,
            timezone,
            values,
        } => timestamp_array(*unit, timezone.as_deref(), values),
    }
}

fn column_to_arrow(column: &Column) -> StoreResult<(Field, ArrayRef)> {
    let name = column.name();
    let (array, metadata): (ArrayRef, _) = match column.data() {
        ColumnData::Text(values) => (
            Arc::new(values.iter().map(Option::as_deref).collect::<StringArray>()) as ArrayRef,
            None,
        ),
        ColumnData::Numeric(values) => (numeric_to_arrow(values), None),
        ColumnData::Categorical(cat) => {
            let keys: Int32Array = cat
                .codes()
                .iter()
                .map(|&c| (c != MISSING_CODE).then_some(c))
                .collect();
            let values: ArrayRef = match cat.categories() {
                CategoryLabels::Text(labels) => Arc::new(StringArray::from_iter_values(labels)),
                CategoryLabels::Numeric(labels) => numeric_to_arrow(labels),
            };
            let dict = DictionaryArray::<Int32Type>::try_new(keys, values).context(ArrowSnafu {
                action: format!("building dictionary for column '{name}'"),
            })?;
            let metadata = HashMap::from([(
                ORDERED_METADATA_KEY.to_string(),
                cat.ordered().to_string(),
            )]);
            (Arc::new(dict) as ArrayRef, Some(metadata))
        }
    };

    let mut field = Field::new(name, array.data_type().clone(), true);
    if let Some(metadata) = metadata {
        field = field.with_metadata(metadata);
    }
    Ok((field, array))
}

impl Table {
    /// Convert an Arrow batch into a table.
    ///
    /// Nulls are only accepted where the store has a missing marker (text,
    /// timestamps, dictionary keys); anything else, including nested types,
    /// is [`crate::StoreError::UnsupportedSchema`].
    pub fn try_from_record_batch(batch: &RecordBatch) -> StoreResult<Table> {
        let schema = batch.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| column_from_arrow(field, array.as_ref()))
            .collect::<StoreResult<Vec<_>>>()?;
        Table::try_new(columns)
    }

    /// Convert the table into an Arrow batch.
    ///
    /// Missing text values, NaT timestamps and missing codes become Arrow
    /// nulls; categoricals become `Dictionary(Int32, _)` with orderedness in
    /// the field metadata.
    pub fn to_record_batch(&self) -> StoreResult<RecordBatch> {
        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = self
            .columns()
            .iter()
            .map(column_to_arrow)
            .collect::<StoreResult<Vec<_>>>()?
            .into_iter()
            .unzip();

        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows()));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
            .context(ArrowSnafu {
                action: "assembling record batch",
            })
    }
}
