//! Per-call options for store writes and reads.
//!
//! There is no process-wide configuration: every operation receives its
//! options explicitly, and `Default` gives the behavior of the plain
//! [`crate::write_store`] / [`crate::read_store`] entry points.

use snafu::ResultExt;

use crate::error::{StoreResult, ThreadPoolSnafu};

/// zstd level used when none is given.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Options for [`crate::write_store_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// zstd level for array payloads (numeric values and categorical codes).
    pub compression_level: i32,
    /// Worker threads for per-column encoding. `None` uses the available
    /// parallelism, capped by the number of columns.
    pub threads: Option<usize>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            threads: None,
        }
    }
}

impl WriteOptions {
    /// Set the zstd compression level.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Options for [`crate::read_store_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Worker threads for per-column decoding. `None` uses the available
    /// parallelism, capped by the number of columns.
    pub threads: Option<usize>,
}

impl ReadOptions {
    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Number of workers to use for `num_columns` independent column jobs.
pub(crate) fn resolve_threads(requested: Option<usize>, num_columns: usize) -> usize {
    let logical_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested
        .unwrap_or(logical_threads)
        .min(num_columns)
        .max(1)
}

/// Build a dedicated pool for one store operation.
pub(crate) fn build_pool(threads: usize) -> StoreResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("colstore-worker-{i}"))
        .build()
        .context(ThreadPoolSnafu)
}
