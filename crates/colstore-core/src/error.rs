//! Error types and SNAFU context selectors for store and codec operations.
//!
//! This module centralizes the [`StoreError`] enum returned by every public
//! operation and exposes its context selectors (via
//! `#[snafu(visibility(pub(crate)))]`) so the codec and store modules can
//! attach context without re-exporting everything at the crate root.

use arrow::error::ArrowError;
use snafu::prelude::*;

use crate::storage::StorageError;

/// Result alias used throughout the public API.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from writing, reading, encoding or decoding a store.
///
/// Nothing is retried internally: every failure is reported to the caller of
/// the operation that hit it, and no variant implies partial success.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// The table uses a feature the format cannot represent (for example a
    /// nested column type, a duplicate column name, or a column name that is
    /// not usable as a file name).
    #[snafu(display("Unsupported schema: {reason}"))]
    UnsupportedSchema {
        /// Why the schema cannot be stored.
        reason: String,
    },

    /// The manifest or a column file is missing.
    #[snafu(display("Not found: {path}"))]
    NotFound {
        /// The missing path.
        path: String,
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },

    /// A caller requested a column that the manifest does not list.
    #[snafu(display("Unknown column '{column}': not present in the store manifest"))]
    UnknownColumn {
        /// The first requested name that is missing from the manifest.
        column: String,
    },

    /// A file's bytes could not be decoded (bad header, failed
    /// decompression, truncated payload, unparsable text or metadata).
    #[snafu(display("Corrupt data in {path}: {details}"))]
    CorruptData {
        /// File that failed to decode.
        path: String,
        /// What was wrong with it.
        details: String,
    },

    /// The manifest dtype tag and the decodable content disagree.
    #[snafu(display("Schema mismatch for column '{column}': {details}"))]
    SchemaMismatch {
        /// Column whose content disagrees with its declared dtype.
        column: String,
        /// Description of the disagreement.
        details: String,
    },

    /// Columns do not share a common row count.
    #[snafu(display(
        "Inconsistent column length: column '{column}' has {actual} rows, expected {expected}"
    ))]
    InconsistentLength {
        /// Column with the unexpected length.
        column: String,
        /// Row count established by the preceding columns.
        expected: usize,
        /// Row count of the offending column.
        actual: usize,
    },

    /// Categorical input handed to a constructor violates the
    /// codes/categories invariants.
    #[snafu(display("Invalid categorical: {details}"))]
    InvalidCategorical {
        /// Description of the violated invariant.
        details: String,
    },

    /// Filesystem failure other than a missing path.
    #[snafu(display("Storage error: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },

    /// Arrow failed to build, convert or (de)serialize a batch.
    #[snafu(display("Arrow error while {action}: {source}"))]
    Arrow {
        /// What the store was doing when Arrow failed.
        action: String,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The worker pool for per-column encode/decode could not be created.
    #[snafu(display("Failed to build worker thread pool: {source}"))]
    ThreadPool {
        /// Underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },
}

/// Map a storage error into a [`StoreError`], surfacing missing paths as
/// [`StoreError::NotFound`].
pub(crate) fn map_storage_error(err: StorageError) -> StoreError {
    if let StorageError::NotFound { path, .. } = &err {
        let path = path.clone();
        return StoreError::NotFound { path, source: err };
    }
    StoreError::Storage { source: err }
}
