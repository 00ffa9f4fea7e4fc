//! On-disk layout helpers for a store root.
//!
//! This module centralizes all *relative* path conventions under a store
//! directory:
//! - the manifest (`manifest.tsv`)
//! - per-column data files (`<col>.csv`, `<col>.bin`)
//! - categorical side metadata (`<col>.meta.json`)
//!
//! The functions here return relative [`std::path::PathBuf`] values. Callers
//! join them with the store root before doing IO. Encoder and decoder both go
//! through these helpers, so a column always maps to the same file names in
//! both directions.

use std::path::PathBuf;

/// Name of the manifest file at the store root.
pub const MANIFEST_FILE_NAME: &str = "manifest.tsv";

/// Extension for delimited-text column files.
pub const TEXT_EXT: &str = "csv";

/// Extension for compressed dense binary arrays (numeric values and
/// categorical codes).
pub const ARRAY_EXT: &str = "bin";

/// Extension for the categorical side metadata file.
pub const CATEGORY_META_EXT: &str = "meta.json";

/// Relative path: `manifest.tsv`
pub fn manifest_rel_path() -> PathBuf {
    PathBuf::from(MANIFEST_FILE_NAME)
}

/// Relative path: `<column>.csv`
pub fn text_rel_path(column: &str) -> PathBuf {
    PathBuf::from(format!("{column}.{TEXT_EXT}"))
}

/// Relative path: `<column>.bin`
pub fn array_rel_path(column: &str) -> PathBuf {
    PathBuf::from(format!("{column}.{ARRAY_EXT}"))
}

/// Relative path: `<column>.meta.json`
pub fn category_meta_rel_path(column: &str) -> PathBuf {
    PathBuf::from(format!("{column}.{CATEGORY_META_EXT}"))
}

/// Check that `column` can be used verbatim as the stem of a file name
/// directly under the store root.
///
/// Returns a short human-readable reason when it cannot.
pub fn column_name_problem(column: &str) -> Option<&'static str> {
    if column.is_empty() {
        return Some("column name is empty");
    }
    if column == "." || column == ".." {
        return Some("column name is a relative directory reference");
    }
    if column.contains(['/', '\\']) {
        return Some("column name contains a path separator");
    }
    if column.chars().any(char::is_control) {
        return Some("column name contains a control character");
    }
    None
}
