//! In-memory table model handed to and returned by the store.
//!
//! A [`Table`] is an ordered list of uniquely named [`Column`]s that all
//! share one row count. There is no row index: rows are identified by
//! position only.

use std::collections::HashSet;

use snafu::prelude::*;

use crate::{
    dtype::{DType, NumericType, TimeUnit},
    error::{
        InconsistentLengthSnafu, InvalidCategoricalSnafu, StoreResult, UnknownColumnSnafu,
        UnsupportedSchemaSnafu,
    },
};

/// Missing-value marker for timestamp columns ("not a time").
pub const NAT: i64 = i64::MIN;

/// Code marking a missing value in a categorical column.
pub const MISSING_CODE: i32 = -1;

/// Dense values of a numeric or temporal column.
///
/// Equality compares floats bit-for-bit, so `NaN` payloads and signed zeros
/// must survive a round trip to compare equal.
#[derive(Debug, Clone)]
pub enum NumericValues {
    /// Booleans.
    Bool(Vec<bool>),
    /// Signed 8-bit integers.
    Int8(Vec<i8>),
    /// Signed 16-bit integers.
    Int16(Vec<i16>),
    /// Signed 32-bit integers.
    Int32(Vec<i32>),
    /// Signed 64-bit integers.
    Int64(Vec<i64>),
    /// Unsigned 8-bit integers.
    UInt8(Vec<u8>),
    /// Unsigned 16-bit integers.
    UInt16(Vec<u16>),
    /// Unsigned 32-bit integers.
    UInt32(Vec<u32>),
    /// Unsigned 64-bit integers.
    UInt64(Vec<u64>),
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
    /// Epoch offsets in `unit`; [`NAT`] marks a missing value.
    Timestamp {
        /// Precision of `values`.
        unit: TimeUnit,
        /// Optional timezone carried through unchanged.
        timezone: Option<String>,
        /// Epoch offsets.
        values: Vec<i64>,
    },
}

macro_rules! impl_numeric_from_vec {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for NumericValues {
                fn from(values: Vec<$t>) -> Self {
                    NumericValues::$variant(values)
                }
            }
        )*
    };
}

impl_numeric_from_vec!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

fn same_bits<T: Copy, F: Fn(T) -> u64>(a: &[T], b: &[T], bits: F) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| bits(*x) == bits(*y))
}

impl PartialEq for NumericValues {
    fn eq(&self, other: &Self) -> bool {
        use NumericValues as N;
        match (self, other) {
            (N::Bool(a), N::Bool(b)) => a == b,
            (N::Int8(a), N::Int8(b)) => a == b,
            (N::Int16(a), N::Int16(b)) => a == b,
            (N::Int32(a), N::Int32(b)) => a == b,
            (N::Int64(a), N::Int64(b)) => a == b,
            (N::UInt8(a), N::UInt8(b)) => a == b,
            (N::UInt16(a), N::UInt16(b)) => a == b,
            (N::UInt32(a), N::UInt32(b)) => a == b,
            (N::UInt64(a), N::UInt64(b)) => a == b,
            (N::Float32(a), N::Float32(b)) => same_bits(a, b, |x| u64::from(x.to_bits())),
            (N::Float64(a), N::Float64(b)) => same_bits(a, b, f64::to_bits),
            (
                N::Timestamp {
                    unit: ua,
                    timezone: ta,
                    values: va,
                },
                N::Timestamp {
                    unit: ub,
                    timezone: tb,
                    values: vb,
                },
            ) => ua == ub && ta == tb && va == vb,
            _ => false,
        }
    }
}

impl NumericValues {
    /// Timestamp values without a timezone.
    pub fn timestamps(unit: TimeUnit, values: Vec<i64>) -> Self {
        NumericValues::Timestamp {
            unit,
            timezone: None,
            values,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            NumericValues::Bool(v) => v.len(),
            NumericValues::Int8(v) => v.len(),
            NumericValues::Int16(v) => v.len(),
            NumericValues::Int32(v) => v.len(),
            NumericValues::Int64(v) => v.len(),
            NumericValues::UInt8(v) => v.len(),
            NumericValues::UInt16(v) => v.len(),
            NumericValues::UInt32(v) => v.len(),
            NumericValues::UInt64(v) => v.len(),
            NumericValues::Float32(v) => v.len(),
            NumericValues::Float64(v) => v.len(),
            NumericValues::Timestamp { values, .. } => values.len(),
        }
    }

    /// True when there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concrete subtype of these values.
    pub fn numeric_type(&self) -> NumericType {
        match self {
            NumericValues::Bool(_) => NumericType::Bool,
            NumericValues::Int8(_) => NumericType::Int8,
            NumericValues::Int16(_) => NumericType::Int16,
            NumericValues::Int32(_) => NumericType::Int32,
            NumericValues::Int64(_) => NumericType::Int64,
            NumericValues::UInt8(_) => NumericType::UInt8,
            NumericValues::UInt16(_) => NumericType::UInt16,
            NumericValues::UInt32(_) => NumericType::UInt32,
            NumericValues::UInt64(_) => NumericType::UInt64,
            NumericValues::Float32(_) => NumericType::Float32,
            NumericValues::Float64(_) => NumericType::Float64,
            NumericValues::Timestamp { unit, timezone, .. } => NumericType::Timestamp {
                unit: *unit,
                timezone: timezone.clone(),
            },
        }
    }

    /// One hashable key per value; two values share a key iff they are the
    /// same bit pattern of the same subtype.
    fn identity_keys(&self) -> Vec<i128> {
        match self {
            NumericValues::Bool(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::Int8(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::Int16(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::Int32(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::Int64(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::UInt8(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::UInt16(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::UInt32(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::UInt64(v) => v.iter().map(|&x| i128::from(x)).collect(),
            NumericValues::Float32(v) => v.iter().map(|x| i128::from(x.to_bits())).collect(),
            NumericValues::Float64(v) => v.iter().map(|x| i128::from(x.to_bits())).collect(),
            NumericValues::Timestamp { values, .. } => {
                values.iter().map(|&x| i128::from(x)).collect()
            }
        }
    }
}

/// Ordered list of unique category labels.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryLabels {
    /// Text labels.
    Text(Vec<String>),
    /// Numeric (or timestamp) labels of one subtype.
    Numeric(NumericValues),
}

impl CategoryLabels {
    /// Number of categories.
    pub fn len(&self) -> usize {
        match self {
            CategoryLabels::Text(v) => v.len(),
            CategoryLabels::Numeric(v) => v.len(),
        }
    }

    /// True when there are no categories.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the first label that repeats an earlier one.
    pub(crate) fn first_duplicate(&self) -> Option<usize> {
        match self {
            CategoryLabels::Text(labels) => {
                let mut seen = HashSet::with_capacity(labels.len());
                labels.iter().position(|l| !seen.insert(l.as_str()))
            }
            CategoryLabels::Numeric(values) => {
                let mut seen = HashSet::with_capacity(values.len());
                values.identity_keys().into_iter().position(|k| !seen.insert(k))
            }
        }
    }
}

/// First `(row, code)` whose code is neither [`MISSING_CODE`] nor a valid
/// index into `num_categories` labels.
pub(crate) fn first_invalid_code(codes: &[i32], num_categories: usize) -> Option<(usize, i32)> {
    codes
        .iter()
        .copied()
        .enumerate()
        .find(|&(_, code)| {
            code != MISSING_CODE && usize::try_from(code).map_or(true, |c| c >= num_categories)
        })
}

/// Dictionary-encoded column values.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    codes: Vec<i32>,
    categories: CategoryLabels,
    ordered: bool,
}

impl Categorical {
    /// Build a categorical from codes and labels.
    ///
    /// Fails with [`crate::StoreError::InvalidCategorical`] when labels are not
    /// unique or a code is neither [`MISSING_CODE`] nor a valid label index.
    pub fn try_new(codes: Vec<i32>, categories: CategoryLabels, ordered: bool) -> StoreResult<Self> {
        if let Some(pos) = categories.first_duplicate() {
            return InvalidCategoricalSnafu {
                details: format!("category at position {pos} repeats an earlier label"),
            }
            .fail();
        }
        if let Some((row, code)) = first_invalid_code(&codes, categories.len()) {
            return InvalidCategoricalSnafu {
                details: format!(
                    "code {code} at row {row} is out of range for {} categories",
                    categories.len()
                ),
            }
            .fail();
        }
        Ok(Self::from_validated_parts(codes, categories, ordered))
    }

    pub(crate) fn from_validated_parts(
        codes: Vec<i32>,
        categories: CategoryLabels,
        ordered: bool,
    ) -> Self {
        Self {
            codes,
            categories,
            ordered,
        }
    }

    /// Dictionary-encode text values. Categories are the distinct labels in
    /// ascending order; `None` becomes [`MISSING_CODE`].
    pub fn from_text<S: AsRef<str>>(values: &[Option<S>], ordered: bool) -> Self {
        let mut labels: Vec<String> = values
            .iter()
            .flatten()
            .map(|s| s.as_ref().to_string())
            .collect();
        labels.sort_unstable();
        labels.dedup();

        let codes = values
            .iter()
            .map(|v| match v {
                Some(s) => labels
                    .binary_search_by(|l| l.as_str().cmp(s.as_ref()))
                    .map_or(MISSING_CODE, |i| i as i32),
                None => MISSING_CODE,
            })
            .collect();

        Self::from_validated_parts(codes, CategoryLabels::Text(labels), ordered)
    }

    /// Integer codes, one per row.
    pub fn codes(&self) -> &[i32] {
        &self.codes
    }

    /// Category labels in their declared order.
    pub fn categories(&self) -> &CategoryLabels {
        &self.categories
    }

    /// Whether the category order is meaningful.
    pub fn ordered(&self) -> bool {
        self.ordered
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Label index of `row`, or `None` when the value is missing.
    pub fn category_index(&self, row: usize) -> Option<usize> {
        self.codes
            .get(row)
            .and_then(|&code| usize::try_from(code).ok())
    }

    /// Decode text categories back to per-row labels.
    ///
    /// Returns `None` when the categories are numeric.
    pub fn text_values(&self) -> Option<Vec<Option<&str>>> {
        let CategoryLabels::Text(labels) = &self.categories else {
            return None;
        };
        Some(
            (0..self.len())
                .map(|row| self.category_index(row).map(|i| labels[i].as_str()))
                .collect(),
        )
    }
}

/// Values of one column, by logical type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Free-form text; `None` is the missing marker.
    Text(Vec<Option<String>>),
    /// Fixed-width numeric or temporal scalars.
    Numeric(NumericValues),
    /// Dictionary-encoded values.
    Categorical(Categorical),
}

impl ColumnData {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(c) => c.len(),
        }
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Manifest dtype tag for these values.
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Text(_) => DType::Text,
            ColumnData::Numeric(v) => DType::Numeric(v.numeric_type()),
            ColumnData::Categorical(_) => DType::Category,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a column from a name and its values.
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Text column from optional strings.
    pub fn text<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        Self::new(name, ColumnData::Text(values))
    }

    /// Numeric or temporal column.
    pub fn numeric(name: impl Into<String>, values: impl Into<NumericValues>) -> Self {
        Self::new(name, ColumnData::Numeric(values.into()))
    }

    /// Categorical column.
    pub fn categorical(name: impl Into<String>, values: Categorical) -> Self {
        Self::new(name, ColumnData::Categorical(values))
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column values.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Consume the column, returning its values.
    pub fn into_data(self) -> ColumnData {
        self.data
    }

    /// Manifest dtype tag.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered, row-aligned collection of uniquely named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

fn ensure_unique_names(columns: &[Column]) -> StoreResult<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        ensure!(
            seen.insert(column.name()),
            UnsupportedSchemaSnafu {
                reason: format!("duplicate column name '{}'", column.name()),
            }
        );
    }
    Ok(())
}

fn common_row_count(columns: &[Column]) -> StoreResult<usize> {
    let num_rows = columns.first().map_or(0, Column::len);
    for column in columns {
        ensure!(
            column.len() == num_rows,
            InconsistentLengthSnafu {
                column: column.name(),
                expected: num_rows,
                actual: column.len(),
            }
        );
    }
    Ok(num_rows)
}

impl Table {
    /// Build a table, checking that names are unique and lengths agree.
    pub fn try_new(columns: Vec<Column>) -> StoreResult<Self> {
        ensure_unique_names(&columns)?;
        let num_rows = common_row_count(&columns)?;
        Ok(Self { columns, num_rows })
    }

    /// Columns in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    /// Shared row count.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Consume the table, returning its columns.
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Project onto `names`, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> StoreResult<Table> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let column = self
                .column(name)
                .context(UnknownColumnSnafu { column: name })?;
            columns.push(column.clone());
        }
        Table::try_new(columns)
    }
}
