//! Whole-store writes and reads.
//!
//! A store is a directory holding one file set per column plus
//! `manifest.tsv`. It is created wholesale by one write, which destroys any
//! directory already at the path, and never mutated afterwards.
//!
//! Write order matters: every column file is written and synced first, and
//! the manifest is renamed into place last. A directory without a manifest
//! is therefore either still being written or the remains of a failed write;
//! readers report it as [`crate::StoreError::NotFound`].
//!
//! The replace itself is not atomic. If a write fails after the old
//! directory was removed, the path is left without a readable store.

use std::{collections::HashSet, path::Path};

use log::{info, warn};
use rayon::prelude::*;
use snafu::prelude::*;

use crate::{
    codec,
    dtype::DType,
    error::{StoreResult, UnknownColumnSnafu, UnsupportedSchemaSnafu, map_storage_error},
    manifest::{Manifest, ManifestEntry},
    options::{ReadOptions, WriteOptions, build_pool, resolve_threads},
    storage::{self, layout},
    table::{Column, Table},
};

/// Which columns [`read_store`] returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every column, in manifest order.
    #[default]
    All,
    /// Exactly these columns, in this order.
    Named(Vec<String>),
}

impl ColumnSelection {
    /// Select `names`, in the given order.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSelection::Named(names.into_iter().map(Into::into).collect())
    }
}

/// File names a column occupies under the store root.
fn column_file_names(name: &str, dtype: &DType) -> Vec<String> {
    let paths = match dtype {
        DType::Text => vec![layout::text_rel_path(name)],
        DType::Numeric(_) => vec![layout::array_rel_path(name)],
        DType::Category => vec![
            layout::array_rel_path(name),
            layout::category_meta_rel_path(name),
        ],
    };
    paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

/// Check that every column of `table` can be stored.
///
/// Column names must be usable as a file-name stem and unique. File names
/// are also compared case-insensitively so a store stays readable on
/// filesystems that fold case.
fn validate_schema(table: &Table) -> StoreResult<()> {
    let mut names = HashSet::with_capacity(table.num_columns());
    let mut files = HashSet::new();
    for column in table.columns() {
        let name = column.name();
        if let Some(problem) = layout::column_name_problem(name) {
            return UnsupportedSchemaSnafu {
                reason: format!("{problem}: {name:?}"),
            }
            .fail();
        }
        ensure!(
            names.insert(name),
            UnsupportedSchemaSnafu {
                reason: format!("duplicate column name '{name}'"),
            }
        );
        for file in column_file_names(name, &column.dtype()) {
            ensure!(
                files.insert(file.to_lowercase()),
                UnsupportedSchemaSnafu {
                    reason: format!(
                        "column '{name}' would write '{file}', which collides with another column's file"
                    ),
                }
            );
        }
    }
    Ok(())
}

/// Write `table` to a fresh store at `path` with default options.
///
/// See [`write_store_with`].
pub fn write_store(table: &Table, path: impl AsRef<Path>) -> StoreResult<()> {
    write_store_with(table, path, &WriteOptions::default())
}

/// Write `table` to a fresh store at `path`.
///
/// Any directory already at `path` is removed recursively first. A regular
/// file or a symlink at `path` is refused, even a symlink to a directory.
/// Columns are encoded in parallel and the store directory is fsynced, so
/// every column file is durable before the manifest is written last.
///
/// Errors:
/// - [`crate::StoreError::UnsupportedSchema`] if a column name is empty, repeated,
///   not usable as a file name, or a label cannot be represented.
/// - [`crate::StoreError::Storage`] on filesystem failures.
pub fn write_store_with(
    table: &Table,
    path: impl AsRef<Path>,
    options: &WriteOptions,
) -> StoreResult<()> {
    let path = path.as_ref();
    validate_schema(table)?;

    if storage::recreate_dir(path).map_err(map_storage_error)? {
        warn!("replacing existing store directory {}", path.display());
    }

    let threads = resolve_threads(options.threads, table.num_columns());
    let pool = build_pool(threads)?;
    pool.install(|| {
        table
            .columns()
            .par_iter()
            .try_for_each(|column| codec::encode_column(column, path, options))
    })?;
    storage::sync_dir(path).map_err(map_storage_error)?;

    Manifest::from_table(table).write(path)?;
    storage::sync_dir(path).map_err(map_storage_error)?;

    info!(
        "wrote store {} ({} columns, {} rows, {threads} threads)",
        path.display(),
        table.num_columns(),
        table.num_rows()
    );
    Ok(())
}

/// Read the manifest of the store at `path`.
///
/// Errors with [`crate::StoreError::NotFound`] if the manifest is missing and
/// [`crate::StoreError::CorruptData`] if it cannot be parsed.
pub fn read_manifest(path: impl AsRef<Path>) -> StoreResult<Manifest> {
    Manifest::read(path.as_ref())
}

/// Manifest entries for `selection`, in the order they should be returned.
fn resolve_selection<'a>(
    manifest: &'a Manifest,
    selection: &ColumnSelection,
) -> StoreResult<Vec<&'a ManifestEntry>> {
    let names = match selection {
        ColumnSelection::All => return Ok(manifest.entries().iter().collect()),
        ColumnSelection::Named(names) => names,
    };

    let entries = names
        .iter()
        .map(|name| {
            manifest
                .get(name)
                .context(UnknownColumnSnafu { column: name.as_str() })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        ensure!(
            seen.insert(name.as_str()),
            UnsupportedSchemaSnafu {
                reason: format!("column '{name}' is requested more than once"),
            }
        );
    }
    Ok(entries)
}

/// Read the store at `path` with default options.
///
/// See [`read_store_with`].
pub fn read_store(path: impl AsRef<Path>, selection: ColumnSelection) -> StoreResult<Table> {
    read_store_with(path, selection, &ReadOptions::default())
}

/// Read all or some columns of the store at `path`.
///
/// Requested names are checked against the manifest before anything is
/// decoded. Errors:
/// - [`crate::StoreError::NotFound`] if the manifest or a column file is missing.
/// - [`crate::StoreError::UnknownColumn`] naming the first requested column that
///   the manifest does not list.
/// - [`crate::StoreError::UnsupportedSchema`] if a name is requested twice.
/// - [`crate::StoreError::CorruptData`] / [`crate::StoreError::SchemaMismatch`] from
///   column decoding.
/// - [`crate::StoreError::InconsistentLength`] if decoded columns disagree on the
///   row count.
pub fn read_store_with(
    path: impl AsRef<Path>,
    selection: ColumnSelection,
    options: &ReadOptions,
) -> StoreResult<Table> {
    let path = path.as_ref();
    let manifest = Manifest::read(path)?;
    let entries = resolve_selection(&manifest, &selection)?;

    let threads = resolve_threads(options.threads, entries.len());
    let pool = build_pool(threads)?;
    let columns: Vec<Column> = pool.install(|| {
        entries
            .par_iter()
            .map(|entry| codec::decode_column(entry.name(), entry.dtype(), path))
            .collect::<StoreResult<Vec<_>>>()
    })?;

    let table = Table::try_new(columns)?;
    info!(
        "read store {} ({} of {} columns, {} rows)",
        path.display(),
        table.num_columns(),
        manifest.len(),
        table.num_rows()
    );
    Ok(table)
}
