//! Dtype tags: the manifest's description of each column.
//!
//! A [`DType`] is a closed enum over the three physical representations
//! (text, dense numeric/temporal array, categorical). Every encode/decode
//! decision is a `match` on it; nothing inspects file bytes to guess a type.
//!
//! The textual form written to the manifest follows NumPy/pandas naming so
//! stores stay readable by humans and by other implementations:
//! `text`, `category`, `bool`, `int8`…`int64`, `uint8`…`uint64`,
//! `float32`, `float64`, `datetime64[us]`, `datetime64[ns, UTC]`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use snafu::prelude::*;

/// Precision of a stored timestamp (values are signed offsets from the Unix
/// epoch, in this unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Seconds.
    Second,
    /// Milliseconds.
    Millisecond,
    /// Microseconds.
    Microsecond,
    /// Nanoseconds.
    Nanosecond,
}

impl TimeUnit {
    fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Microsecond => "us",
            TimeUnit::Nanosecond => "ns",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "s" => Some(TimeUnit::Second),
            "ms" => Some(TimeUnit::Millisecond),
            "us" => Some(TimeUnit::Microsecond),
            "ns" => Some(TimeUnit::Nanosecond),
            _ => None,
        }
    }

    /// Interpret `value` (an epoch offset in this unit) as a UTC datetime.
    ///
    /// Returns `None` when the value is out of chrono's representable range.
    pub fn to_datetime(self, value: i64) -> Option<DateTime<Utc>> {
        match self {
            TimeUnit::Second => DateTime::from_timestamp(value, 0),
            TimeUnit::Millisecond => DateTime::from_timestamp_millis(value),
            TimeUnit::Microsecond => DateTime::from_timestamp_micros(value),
            TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(value)),
        }
    }

    /// Express `dt` as an epoch offset in this unit, truncating any finer
    /// precision.
    ///
    /// Returns `None` if the result does not fit in an `i64`.
    pub fn from_datetime(self, dt: &DateTime<Utc>) -> Option<i64> {
        match self {
            TimeUnit::Second => Some(dt.timestamp()),
            TimeUnit::Millisecond => Some(dt.timestamp_millis()),
            TimeUnit::Microsecond => Some(dt.timestamp_micros()),
            TimeUnit::Nanosecond => dt.timestamp_nanos_opt(),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Fixed-width element type of a dense binary array.
///
/// The discriminant is the byte recorded in the array file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    /// One byte, 0 or 1.
    Bool = 1,
    /// Signed 8-bit integer.
    Int8 = 2,
    /// Signed 16-bit integer.
    Int16 = 3,
    /// Signed 32-bit integer.
    Int32 = 4,
    /// Signed 64-bit integer.
    Int64 = 5,
    /// Unsigned 8-bit integer.
    UInt8 = 6,
    /// Unsigned 16-bit integer.
    UInt16 = 7,
    /// Unsigned 32-bit integer.
    UInt32 = 8,
    /// Unsigned 64-bit integer.
    UInt64 = 9,
    /// IEEE-754 single precision.
    Float32 = 10,
    /// IEEE-754 double precision.
    Float64 = 11,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            ElementType::Bool | ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    /// Header byte for this element type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ElementType::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => ElementType::Bool,
            2 => ElementType::Int8,
            3 => ElementType::Int16,
            4 => ElementType::Int32,
            5 => ElementType::Int64,
            6 => ElementType::UInt8,
            7 => ElementType::UInt16,
            8 => ElementType::UInt32,
            9 => ElementType::UInt64,
            10 => ElementType::Float32,
            11 => ElementType::Float64,
            _ => return None,
        })
    }
}

/// Concrete subtype of a numeric or temporal column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumericType {
    /// Boolean stored as one byte per value.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Epoch-based timestamp stored as `i64`.
    Timestamp {
        /// Precision of the stored offsets.
        unit: TimeUnit,
        /// Optional IANA timezone carried through unchanged.
        timezone: Option<String>,
    },
}

impl NumericType {
    /// Element type used for this subtype's dense array.
    pub fn element_type(&self) -> ElementType {
        match self {
            NumericType::Bool => ElementType::Bool,
            NumericType::Int8 => ElementType::Int8,
            NumericType::Int16 => ElementType::Int16,
            NumericType::Int32 => ElementType::Int32,
            NumericType::Int64 | NumericType::Timestamp { .. } => ElementType::Int64,
            NumericType::UInt8 => ElementType::UInt8,
            NumericType::UInt16 => ElementType::UInt16,
            NumericType::UInt32 => ElementType::UInt32,
            NumericType::UInt64 => ElementType::UInt64,
            NumericType::Float32 => ElementType::Float32,
            NumericType::Float64 => ElementType::Float64,
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericType::Bool => write!(f, "bool"),
            NumericType::Int8 => write!(f, "int8"),
            NumericType::Int16 => write!(f, "int16"),
            NumericType::Int32 => write!(f, "int32"),
            NumericType::Int64 => write!(f, "int64"),
            NumericType::UInt8 => write!(f, "uint8"),
            NumericType::UInt16 => write!(f, "uint16"),
            NumericType::UInt32 => write!(f, "uint32"),
            NumericType::UInt64 => write!(f, "uint64"),
            NumericType::Float32 => write!(f, "float32"),
            NumericType::Float64 => write!(f, "float64"),
            NumericType::Timestamp { unit, timezone } => match timezone {
                Some(tz) => write!(f, "datetime64[{unit}, {tz}]"),
                None => write!(f, "datetime64[{unit}]"),
            },
        }
    }
}

/// Logical type of a column as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DType {
    /// Free-form UTF-8 text, stored as a delimited text file.
    Text,
    /// Fixed-width scalars, stored as a compressed dense array.
    Numeric(NumericType),
    /// Dictionary-encoded values: codes array plus category metadata.
    Category,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Text => write!(f, "text"),
            DType::Numeric(t) => write!(f, "{t}"),
            DType::Category => write!(f, "category"),
        }
    }
}

/// Error returned when a manifest dtype tag is not recognized.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(display("Unrecognized dtype tag '{tag}'"))]
pub struct ParseDTypeError {
    tag: String,
}

impl ParseDTypeError {
    /// The tag that failed to parse.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

fn parse_timestamp(rest: &str) -> Option<NumericType> {
    // Bare `datetime64` is NumPy's default nanosecond precision.
    if rest.is_empty() {
        return Some(NumericType::Timestamp {
            unit: TimeUnit::Nanosecond,
            timezone: None,
        });
    }

    let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
    let (unit, timezone) = match inner.split_once(',') {
        Some((unit, tz)) => {
            let tz = tz.trim();
            if tz.is_empty() {
                return None;
            }
            (unit.trim(), Some(tz.to_string()))
        }
        None => (inner.trim(), None),
    };

    Some(NumericType::Timestamp {
        unit: TimeUnit::from_suffix(unit)?,
        timezone,
    })
}

impl FromStr for DType {
    type Err = ParseDTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let numeric = match tag {
            // `object` is how pandas spells string columns.
            "text" | "object" => return Ok(DType::Text),
            "category" => return Ok(DType::Category),
            "bool" => Some(NumericType::Bool),
            "int8" => Some(NumericType::Int8),
            "int16" => Some(NumericType::Int16),
            "int32" => Some(NumericType::Int32),
            "int64" => Some(NumericType::Int64),
            "uint8" => Some(NumericType::UInt8),
            "uint16" => Some(NumericType::UInt16),
            "uint32" => Some(NumericType::UInt32),
            "uint64" => Some(NumericType::UInt64),
            "float32" => Some(NumericType::Float32),
            "float64" => Some(NumericType::Float64),
            other => other.strip_prefix("datetime64").and_then(parse_timestamp),
        };

        numeric.map(DType::Numeric).ok_or_else(|| ParseDTypeError {
            tag: s.to_string(),
        })
    }
}
