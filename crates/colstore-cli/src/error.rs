use arrow::error::ArrowError;
use colstore_core::StoreError;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Failed to read store at {path}: {source}"))]
    ReadStore {
        path: String,
        #[snafu(source(from(StoreError, Box::new)))]
        source: Box<StoreError>,
    },

    #[snafu(display(
        "Failed to write store at {path}: {source}. \
         Ensure the parent directory is writable."
    ))]
    WriteStore {
        path: String,
        #[snafu(source(from(StoreError, Box::new)))]
        source: Box<StoreError>,
    },

    #[snafu(display("Cannot convert {what}: {source}"))]
    Convert {
        what: String,
        #[snafu(source(from(StoreError, Box::new)))]
        source: Box<StoreError>,
    },

    #[snafu(display("CSV file not found or not accessible: {path}"))]
    CsvMissing {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Arrow error while {action}: {source}"))]
    Arrow { action: String, source: ArrowError },

    #[snafu(display("--categorical column '{column}' is not in the CSV header"))]
    UnknownCategorical { column: String },

    #[snafu(display("Failed to write output: {source}"))]
    Output { source: std::io::Error },
}
