//! Integration tests for store failure modes.
//!
//! Each test damages or misuses a store in one specific way and checks that
//! the reported error names the right problem:
//! - unknown or repeated column selections,
//! - missing manifest or column files,
//! - corrupted array payloads and out-of-range categorical codes,
//! - manifest tags that disagree with the files on disk,
//! - schemas the format cannot hold.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::path::Path;

use colstore_core::{
    Column, ColumnSelection, StoreError, Table, read_manifest, read_store, write_store,
};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn written_abcd(tmp: &TempDir) -> Result<std::path::PathBuf, StoreError> {
    let store = tmp.path().join("store");
    write_store(&common::abcd_table(), &store)?;
    Ok(store)
}

/// Re-encode `values` as the codes array of categorical column `column`.
fn overwrite_codes(store: &Path, column: &str, values: &[i32]) -> TestResult {
    let bytes = std::fs::read(store.join(format!("{column}.bin")))?;
    let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut rewritten = bytes[..8].to_vec();
    rewritten.extend_from_slice(&(values.len() as u64).to_le_bytes());
    rewritten.extend(zstd::stream::encode_all(payload.as_slice(), 3)?);
    std::fs::write(store.join(format!("{column}.bin")), rewritten)?;
    Ok(())
}

#[test]
fn unknown_column_names_first_offender() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;

    let err = read_store(&store, ColumnSelection::named(["A", "nope", "also_nope"]))
        .expect_err("unknown column");
    assert!(
        matches!(&err, StoreError::UnknownColumn { column } if column == "nope"),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn unknown_column_is_reported_before_any_decode() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    std::fs::remove_file(store.join("A.csv"))?;

    let err = read_store(&store, ColumnSelection::named(["A", "Z"])).expect_err("Z unknown");
    assert!(matches!(err, StoreError::UnknownColumn { .. }), "{err:?}");
    Ok(())
}

#[test]
fn missing_manifest_is_not_found() -> TestResult {
    let tmp = TempDir::new()?;

    let err = read_store(tmp.path().join("never_written"), ColumnSelection::All)
        .expect_err("no store");
    assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");

    let store = written_abcd(&tmp)?;
    std::fs::remove_file(store.join("manifest.tsv"))?;
    let err = read_manifest(&store).expect_err("manifest removed");
    assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");
    Ok(())
}

#[test]
fn missing_column_file_is_not_found() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    std::fs::remove_file(store.join("B.meta.json"))?;

    // Columns that do not need the file still read fine.
    read_store(&store, ColumnSelection::named(["A", "D"]))?;

    let err = read_store(&store, ColumnSelection::All).expect_err("B metadata missing");
    assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");
    Ok(())
}

#[test]
fn code_equal_to_category_count_is_schema_mismatch() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    overwrite_codes(&store, "B", &[0, 1, 2, 4])?;

    let err = read_store(&store, ColumnSelection::All).expect_err("code 4 of 4 categories");
    assert!(
        matches!(&err, StoreError::SchemaMismatch { column, .. } if column == "B"),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn negative_code_other_than_missing_is_schema_mismatch() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    overwrite_codes(&store, "B", &[0, -1, -2, 3])?;

    let err = read_store(&store, ColumnSelection::named(["B"])).expect_err("code -2");
    assert!(matches!(err, StoreError::SchemaMismatch { .. }), "{err:?}");
    Ok(())
}

#[test]
fn truncated_payload_is_corrupt() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    let path = store.join("D.bin");
    let bytes = std::fs::read(&path)?;
    std::fs::write(&path, &bytes[..bytes.len() - 3])?;

    let err = read_store(&store, ColumnSelection::named(["D"])).expect_err("truncated");
    assert!(matches!(err, StoreError::CorruptData { .. }), "{err:?}");
    Ok(())
}

#[test]
fn manifest_tag_disagreeing_with_file_is_schema_mismatch() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    let manifest = std::fs::read_to_string(store.join("manifest.tsv"))?;
    std::fs::write(
        store.join("manifest.tsv"),
        manifest.replace("D\tuint64", "D\tfloat32"),
    )?;

    let err = read_store(&store, ColumnSelection::named(["D"])).expect_err("u64 vs f32");
    assert!(
        matches!(&err, StoreError::SchemaMismatch { column, .. } if column == "D"),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn columns_of_different_lengths_are_inconsistent() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    let short = tmp.path().join("short");
    write_store(
        &Table::try_new(vec![Column::numeric("D", vec![1u64, 2])])?,
        &short,
    )?;
    std::fs::copy(short.join("D.bin"), store.join("D.bin"))?;

    let err = read_store(&store, ColumnSelection::All).expect_err("D has 2 rows");
    assert!(
        matches!(
            &err,
            StoreError::InconsistentLength { column, expected: 4, actual: 2 } if column == "D"
        ),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn path_like_column_names_are_unsupported() -> TestResult {
    let tmp = TempDir::new()?;
    for name in ["", "..", "a/b"] {
        let table = Table::try_new(vec![Column::numeric(name, vec![1u8])])?;
        let err = write_store(&table, tmp.path().join("bad")).expect_err(name);
        assert!(matches!(err, StoreError::UnsupportedSchema { .. }), "{name:?}: {err:?}");
    }
    Ok(())
}

#[test]
fn rejected_schema_leaves_existing_store_untouched() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;

    let bad = Table::try_new(vec![Column::numeric("x/y", vec![1u8])])?;
    write_store(&bad, &store).expect_err("bad name");

    assert_eq!(read_store(&store, ColumnSelection::All)?, common::abcd_table());
    Ok(())
}

#[test]
fn regular_file_at_store_path_is_refused() -> TestResult {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("file");
    std::fs::write(&path, b"not a store")?;

    let err = write_store(&common::abcd_table(), &path).expect_err("file in the way");
    assert!(matches!(err, StoreError::Storage { .. }), "{err:?}");
    assert_eq!(std::fs::read(&path)?, b"not a store");
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlink_at_store_path_is_refused() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;
    let link = tmp.path().join("link");
    std::os::unix::fs::symlink(&store, &link)?;

    let err = write_store(&common::abcd_table(), &link).expect_err("symlink in the way");
    assert!(matches!(err, StoreError::Storage { .. }), "{err:?}");
    assert_eq!(read_store(&store, ColumnSelection::All)?, common::abcd_table());
    Ok(())
}

#[test]
fn oversized_array_payload_is_corrupt() -> TestResult {
    let tmp = TempDir::new()?;
    let store = written_abcd(&tmp)?;

    let bytes = std::fs::read(store.join("D.bin"))?;
    let mut rewritten = bytes[..16].to_vec();
    rewritten.extend(zstd::stream::encode_all(vec![0u8; 1 << 20].as_slice(), 3)?);
    std::fs::write(store.join("D.bin"), rewritten)?;

    let err = read_store(&store, ColumnSelection::named(["D"])).expect_err("payload too long");
    assert!(matches!(err, StoreError::CorruptData { .. }), "{err:?}");
    assert!(err.to_string().contains("more than the 32 bytes"), "{err}");
    Ok(())
}
