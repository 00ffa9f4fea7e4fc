//! The store manifest (`manifest.tsv`).
//!
//! A tab-separated file with header `col<TAB>dtype` and one row per column
//! in table order. It is the single source of truth for which files belong
//! to a store and how to decode them.

use std::{collections::HashSet, io::Cursor, path::Path, sync::Arc};

use arrow::{
    array::{AsArray, StringArray},
    csv::{ReaderBuilder, WriterBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use snafu::prelude::*;

use crate::{
    dtype::DType,
    error::{ArrowSnafu, CorruptDataSnafu, StoreError, StoreResult, map_storage_error},
    storage::{self, layout},
    table::Table,
};

const NAME_HEADER: &str = "col";
const DTYPE_HEADER: &str = "dtype";
const DELIMITER: u8 = b'\t';

/// One manifest row: a column name and its declared dtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    name: String,
    dtype: DType,
}

impl ManifestEntry {
    /// Create an entry.
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dtype.
    pub fn dtype(&self) -> &DType {
        &self.dtype
    }
}

/// Ordered list of (column name, dtype) pairs describing one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

fn manifest_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(NAME_HEADER, DataType::Utf8, true),
        Field::new(DTYPE_HEADER, DataType::Utf8, true),
    ]))
}

impl Manifest {
    /// Manifest describing `table`, in column order.
    pub fn from_table(table: &Table) -> Self {
        Self {
            entries: table
                .columns()
                .iter()
                .map(|c| ManifestEntry::new(c.name(), c.dtype()))
                .collect(),
        }
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Look up an entry by column name.
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(ManifestEntry::name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the manifest into `dir` with write-then-rename.
    pub(crate) fn write(&self, dir: &Path) -> StoreResult<()> {
        let names: StringArray = self.entries.iter().map(|e| Some(e.name())).collect();
        let dtypes: StringArray = self
            .entries
            .iter()
            .map(|e| Some(e.dtype().to_string()))
            .collect();
        let batch = RecordBatch::try_new(
            manifest_schema(),
            vec![Arc::new(names), Arc::new(dtypes)],
        )
        .context(ArrowSnafu {
            action: "building manifest batch",
        })?;

        let mut buf = Vec::new();
        {
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .with_delimiter(DELIMITER)
                .build(&mut buf);
            writer.write(&batch).context(ArrowSnafu {
                action: "writing manifest",
            })?;
        }

        storage::write_atomic(&dir.join(layout::manifest_rel_path()), &buf)
            .map_err(map_storage_error)
    }

    /// Read the manifest of the store at `dir`.
    ///
    /// Errors:
    /// - [`StoreError::NotFound`] if `manifest.tsv` is absent.
    /// - [`StoreError::CorruptData`] if the header, a dtype tag or a column
    ///   name is invalid, or a name repeats.
    pub(crate) fn read(dir: &Path) -> StoreResult<Self> {
        let path = dir.join(layout::manifest_rel_path());
        let bytes = storage::read_all_bytes(&path).map_err(map_storage_error)?;
        let corrupt = |details: String| -> StoreError {
            CorruptDataSnafu {
                path: path.display().to_string(),
                details,
            }
            .build()
        };
        let arrow_corrupt = |e: ArrowError| corrupt(format!("unreadable manifest: {e}"));

        let header = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
        let header = header.strip_suffix(b"\r").unwrap_or(header);
        let expected = format!("{NAME_HEADER}\t{DTYPE_HEADER}");
        if header != expected.as_bytes() {
            return Err(corrupt(format!(
                "header is {:?}, expected {expected:?}",
                String::from_utf8_lossy(header)
            )));
        }

        let reader = ReaderBuilder::new(manifest_schema())
            .with_header(true)
            .with_delimiter(DELIMITER)
            .build_buffered(Cursor::new(bytes.as_slice()))
            .map_err(arrow_corrupt)?;

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for batch in reader {
            let batch = batch.map_err(arrow_corrupt)?;
            let names = batch.column(0).as_string::<i32>();
            let dtypes = batch.column(1).as_string::<i32>();

            for (name, tag) in names.iter().zip(dtypes.iter()) {
                let row = entries.len() + 1;
                let (Some(name), Some(tag)) = (name, tag) else {
                    return Err(corrupt(format!("row {row} has an empty field")));
                };
                if let Some(problem) = layout::column_name_problem(name) {
                    return Err(corrupt(format!("row {row}: {problem}: {name:?}")));
                }
                if !seen.insert(name.to_string()) {
                    return Err(corrupt(format!("column '{name}' is listed twice")));
                }
                let dtype = tag
                    .parse::<DType>()
                    .map_err(|e| corrupt(format!("row {row}: {e}")))?;
                entries.push(ManifestEntry::new(name, dtype));
            }
        }

        Ok(Self { entries })
    }
}
