//! Core engine for a column-per-file on-disk table store.
//!
//! A store is a directory in which every column of a table lives in its own
//! file(s), encoded according to the column's logical type, next to a
//! `manifest.tsv` that lists column names and dtype tags in table order:
//!
//! - text columns as single-column CSV (`<col>.csv`),
//! - numeric and timestamp columns as zstd-compressed dense little-endian
//!   arrays with a small header (`<col>.bin`),
//! - categorical columns as int32 codes (`<col>.bin`) plus a JSON list of
//!   labels and an orderedness flag (`<col>.meta.json`).
//!
//! The crate is organized as:
//!
//! - `table`: the in-memory [`Table`] / [`Column`] model.
//! - `dtype`: the closed set of dtype tags ([`DType`]).
//! - `codec`: per-column encode/decode ([`codec::encode_column`],
//!   [`codec::decode_column`]).
//! - `manifest`: reading and writing `manifest.tsv`.
//! - `store`: whole-store writes and full or selective reads
//!   ([`write_store`], [`read_store`]).
//! - `storage`: filesystem primitives and the on-disk naming scheme.
//! - `record_batch`: conversion to and from Arrow `RecordBatch`.
//!
//! Every operation is synchronous and takes an explicit path and explicit
//! options; there is no global configuration.
#![deny(missing_docs)]
pub mod codec;
pub mod dtype;
pub mod error;
pub mod manifest;
pub mod options;
pub mod record_batch;
pub mod storage;
pub mod store;
pub mod table;

pub use dtype::{DType, NumericType, TimeUnit};
pub use error::{StoreError, StoreResult};
pub use manifest::{Manifest, ManifestEntry};
pub use options::{ReadOptions, WriteOptions};
pub use store::{
    ColumnSelection, read_manifest, read_store, read_store_with, write_store, write_store_with,
};
pub use table::{Categorical, CategoryLabels, Column, ColumnData, NumericValues, Table};
