//! Compressed dense arrays (`<col>.bin`).
//!
//! Layout:
//!
//! ```text
//! offset 0   magic          b"CSAR"
//! offset 4   version        u8 (1)
//! offset 5   element type   u8 (see ElementType)
//! offset 6   reserved       [u8; 2], zero
//! offset 8   element count  u64 little-endian
//! offset 16  zstd frame of `count * width` little-endian bytes
//! ```
//!
//! The header lets a reader check the element type and length against the
//! manifest before trusting the payload.

use std::{io::Read, path::Path};

use snafu::prelude::*;

use crate::{
    dtype::{ElementType, NumericType},
    error::{CorruptDataSnafu, SchemaMismatchSnafu, StoreError, StoreResult, map_storage_error},
    storage::{self, OtherIoSnafu, OutputSink},
    table::NumericValues,
};

const MAGIC: &[u8; 4] = b"CSAR";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 16;

/// A fixed-width scalar with a little-endian byte form.
pub(crate) trait LeScalar: Copy + Send + Sync {
    /// Element type recorded in the header.
    const ELEMENT: ElementType;

    fn put(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `ELEMENT.width()` long.
    fn get(bytes: &[u8]) -> Self;
}

macro_rules! impl_le_scalar {
    ($($t:ty => $element:ident),* $(,)?) => {
        $(
            impl LeScalar for $t {
                const ELEMENT: ElementType = ElementType::$element;

                fn put(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn get(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_le_scalar!(
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

impl LeScalar for bool {
    const ELEMENT: ElementType = ElementType::Bool;

    fn put(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn get(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

fn header_bytes(element: ElementType, count: u64) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(MAGIC);
    header[4] = VERSION;
    header[5] = element.code();
    header[8..].copy_from_slice(&count.to_le_bytes());
    header
}

fn corrupt(path: &Path, details: String) -> StoreError {
    CorruptDataSnafu {
        path: path.display().to_string(),
        details,
    }
    .build()
}

/// Split a file into its element type, element count and compressed
/// payload.
fn parse_header<'a>(path: &Path, bytes: &'a [u8]) -> StoreResult<(ElementType, u64, &'a [u8])> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt(
            path,
            format!(
                "file is {} bytes, shorter than the {HEADER_LEN}-byte array header",
                bytes.len()
            ),
        ));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);

    if &header[..4] != MAGIC {
        return Err(corrupt(path, "bad magic, not a colstore array file".into()));
    }
    if header[4] != VERSION {
        return Err(corrupt(
            path,
            format!("unsupported array format version {}", header[4]),
        ));
    }
    let element = ElementType::from_code(header[5])
        .ok_or_else(|| corrupt(path, format!("unknown element type code {}", header[5])))?;
    if header[6..8] != [0, 0] {
        return Err(corrupt(path, "reserved header bytes are not zero".into()));
    }

    let mut count = [0u8; 8];
    count.copy_from_slice(&header[8..]);
    Ok((element, u64::from_le_bytes(count), payload))
}

/// Write `values` as a header plus a zstd frame at `path`.
pub(crate) fn write_array<T: LeScalar>(path: &Path, values: &[T], level: i32) -> StoreResult<()> {
    let mut raw = Vec::with_capacity(values.len() * T::ELEMENT.width());
    for value in values {
        value.put(&mut raw);
    }

    let mut sink = OutputSink::open(path).map_err(map_storage_error)?;
    sink.write_all(&header_bytes(T::ELEMENT, values.len() as u64))
        .map_err(map_storage_error)?;
    zstd::stream::copy_encode(raw.as_slice(), sink.writer(), level)
        .context(OtherIoSnafu {
            path: path.display().to_string(),
        })
        .map_err(map_storage_error)?;
    sink.finish().map_err(map_storage_error)
}

/// Read an array of `T` for `column` from `path`.
///
/// A header element type other than `T` is a [`StoreError::SchemaMismatch`];
/// anything wrong with the bytes themselves is [`StoreError::CorruptData`].
pub(crate) fn read_array<T: LeScalar>(path: &Path, column: &str) -> StoreResult<Vec<T>> {
    let bytes = storage::read_all_bytes(path).map_err(map_storage_error)?;
    let (element, count, payload) = parse_header(path, &bytes)?;

    ensure!(
        element == T::ELEMENT,
        SchemaMismatchSnafu {
            column,
            details: format!(
                "array file holds {element:?} elements, manifest expects {:?}",
                T::ELEMENT
            ),
        }
    );

    let width = T::ELEMENT.width();
    let expected_len = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(width))
        .ok_or_else(|| corrupt(path, format!("element count {count} is too large")))?;

    // Inflate at most one byte past the promised length.
    let mut raw = Vec::new();
    zstd::stream::read::Decoder::with_buffer(payload)
        .map_err(|e| corrupt(path, format!("zstd decompression failed: {e}")))?
        .take((expected_len as u64).saturating_add(1))
        .read_to_end(&mut raw)
        .map_err(|e| corrupt(path, format!("zstd decompression failed: {e}")))?;
    if raw.len() > expected_len {
        return Err(corrupt(
            path,
            format!(
                "payload holds more than the {expected_len} bytes the header promises \
                 ({count} x {width})"
            ),
        ));
    }
    if raw.len() != expected_len {
        return Err(corrupt(
            path,
            format!(
                "payload holds {} bytes, header promises {count} x {width} = {expected_len}",
                raw.len()
            ),
        ));
    }

    Ok(raw.chunks_exact(width).map(T::get).collect())
}

/// Encode numeric or temporal values.
pub(crate) fn write_numeric(path: &Path, values: &NumericValues, level: i32) -> StoreResult<()> {
    match values {
        NumericValues::Bool(v) => write_array(path, v, level),
        NumericValues::Int8(v) => write_array(path, v, level),
        NumericValues::Int16(v) => write_array(path, v, level),
        NumericValues::Int32(v) => write_array(path, v, level),
        NumericValues::Int64(v) => write_array(path, v, level),
        NumericValues::UInt8(v) => write_array(path, v, level),
        NumericValues::UInt16(v) => write_array(path, v, level),
        NumericValues::UInt32(v) => write_array(path, v, level),
        NumericValues::UInt64(v) => write_array(path, v, level),
        NumericValues::Float32(v) => write_array(path, v, level),
        NumericValues::Float64(v) => write_array(path, v, level),
        NumericValues::Timestamp { values, .. } => write_array(path, values, level),
    }
}

/// Decode numeric or temporal values of the declared subtype.
pub(crate) fn read_numeric(
    path: &Path,
    column: &str,
    numeric_type: &NumericType,
) -> StoreResult<NumericValues> {
    Ok(match numeric_type {
        NumericType::Bool => NumericValues::Bool(read_array(path, column)?),
        NumericType::Int8 => NumericValues::Int8(read_array(path, column)?),
        NumericType::Int16 => NumericValues::Int16(read_array(path, column)?),
        NumericType::Int32 => NumericValues::Int32(read_array(path, column)?),
        NumericType::Int64 => NumericValues::Int64(read_array(path, column)?),
        NumericType::UInt8 => NumericValues::UInt8(read_array(path, column)?),
        NumericType::UInt16 => NumericValues::UInt16(read_array(path, column)?),
        NumericType::UInt32 => NumericValues::UInt32(read_array(path, column)?),
        NumericType::UInt64 => NumericValues::UInt64(read_array(path, column)?),
        NumericType::Float32 => NumericValues::Float32(read_array(path, column)?),
        NumericType::Float64 => NumericValues::Float64(read_array(path, column)?),
        NumericType::Timestamp { unit, timezone } => NumericValues::Timestamp {
            unit: *unit,
            timezone: timezone.clone(),
            values: read_array(path, column)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::TimeUnit;
    use crate::table::NAT;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn numeric_values_survive_encode_decode() -> TestResult {
        let tmp = TempDir::new()?;
        let cases = vec![
            NumericValues::from(vec![true, false, true]),
            NumericValues::from(vec![i8::MIN, 0, i8::MAX]),
            NumericValues::from(vec![i16::MIN, -1, i16::MAX]),
            NumericValues::from(vec![u32::MAX, 0, 7]),
            NumericValues::from(vec![u64::MAX, 1, 0]),
            NumericValues::from(vec![f32::NAN, -0.0, f32::INFINITY]),
            NumericValues::from(vec![1.5f64, f64::NEG_INFINITY, f64::MIN_POSITIVE]),
            NumericValues::Timestamp {
                unit: TimeUnit::Nanosecond,
                timezone: Some("UTC".to_string()),
                values: vec![0, NAT, 1_700_000_000_000_000_000],
            },
            NumericValues::from(Vec::<i64>::new()),
        ];

        for (i, values) in cases.into_iter().enumerate() {
            let path = tmp.path().join(format!("c{i}.bin"));
            write_numeric(&path, &values, 3)?;
            let decoded = read_numeric(&path, "c", &values.numeric_type())?;
            assert_eq!(decoded, values, "case {i}");
        }
        Ok(())
    }

    #[test]
    fn header_records_type_and_count() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("h.bin");
        write_array(&path, &[1u16, 2, 3], 1)?;

        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[..4], b"CSAR");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], ElementType::UInt16.code());
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(&bytes[8..16], &3u64.to_le_bytes());
        Ok(())
    }

    #[test]
    fn element_type_disagreement_is_schema_mismatch() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("x.bin");
        write_array(&path, &[1i32, 2], 3)?;

        let err = read_array::<i64>(&path, "x").expect_err("int32 file read as int64");
        assert!(
            matches!(&err, StoreError::SchemaMismatch { column, .. } if column == "x"),
            "unexpected error: {err:?}"
        );
        Ok(())
    }

    #[test]
    fn count_disagreement_is_corrupt() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("n.bin");
        write_array(&path, &[1i64, 2, 3], 3)?;

        let mut bytes = std::fs::read(&path)?;
        bytes[8..16].copy_from_slice(&4u64.to_le_bytes());
        std::fs::write(&path, &bytes)?;

        let err = read_array::<i64>(&path, "n").expect_err("count mismatch");
        assert!(matches!(err, StoreError::CorruptData { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn damaged_files_are_corrupt() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("d.bin");
        write_array(&path, &[1.0f64, 2.0, 3.0], 3)?;
        let good = std::fs::read(&path)?;

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        let truncated_header = good[..10].to_vec();
        let mut garbage_payload = good[..HEADER_LEN].to_vec();
        garbage_payload.extend_from_slice(b"definitely not zstd");
        let mut bad_version = good.clone();
        bad_version[4] = 2;

        for bytes in [bad_magic, truncated_header, garbage_payload, bad_version] {
            std::fs::write(&path, &bytes)?;
            let err = read_array::<f64>(&path, "d").expect_err("damaged file");
            assert!(matches!(err, StoreError::CorruptData { .. }), "{err:?}");
        }
        Ok(())
    }

    #[test]
    fn oversized_payload_is_rejected_early() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("big.bin");
        let mut bytes = header_bytes(ElementType::UInt8, 3).to_vec();
        bytes.extend(zstd::stream::encode_all(vec![0u8; 1 << 20].as_slice(), 3)?);
        std::fs::write(&path, &bytes)?;

        let err = read_array::<u8>(&path, "big").expect_err("payload longer than header");
        assert!(matches!(err, StoreError::CorruptData { .. }), "{err:?}");
        assert!(err.to_string().contains("more than the 3 bytes"), "{err}");
        Ok(())
    }

    #[test]
    fn missing_file_is_not_found() -> TestResult {
        let tmp = TempDir::new()?;
        let err = read_array::<u8>(&tmp.path().join("absent.bin"), "absent")
            .expect_err("missing file");
        assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");
        Ok(())
    }
}
