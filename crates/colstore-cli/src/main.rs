//! CLI tool for inspecting, exporting and importing colstore directories.

mod error;
mod import;
mod output;

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use clap::{Parser, Subcommand, ValueEnum};
use colstore_core::{
    ColumnSelection, ReadOptions, Table, WriteOptions, read_manifest, read_store_with,
    write_store_with,
};
use log::debug;
use snafu::ResultExt;

use crate::{
    error::{CliResult, ConvertSnafu, OutputSnafu, ReadStoreSnafu, WriteStoreSnafu},
    output::{OutputFormat, render_table, write_batch},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Table,
    Csv,
    Jsonl,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(v: OutputFormatArg) -> Self {
        match v {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the columns of a store and their dtype tags
    Columns {
        #[arg(long)]
        store: PathBuf,
    },

    /// Print the contents of a store
    Cat {
        #[arg(long)]
        store: PathBuf,

        /// Comma-separated column names, in output order (default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Rows shown in the table preview; csv and jsonl emit every row
        #[arg(long, default_value_t = 10)]
        max_rows: usize,

        #[arg(long, value_enum, default_value_t = OutputFormatArg::Table)]
        format: OutputFormatArg,

        /// Decode worker threads (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Write a headered CSV file out as a new store
    Import {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        store: PathBuf,

        /// Repeatable column names to store as categoricals
        #[arg(long = "categorical")]
        categorical: Vec<String>,

        /// Encode worker threads (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,

        /// zstd compression level for binary columns
        #[arg(long, default_value_t = colstore_core::options::DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
    },
}

#[derive(Debug, Parser)]
#[command(name = "colstore", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

fn cmd_columns(store: &Path) -> CliResult<()> {
    let manifest = read_manifest(store).context(ReadStoreSnafu {
        path: store.display().to_string(),
    })?;

    let headers = vec!["col".to_string(), "dtype".to_string()];
    let rows: Vec<Vec<String>> = manifest
        .entries()
        .iter()
        .map(|e| vec![e.name().to_string(), e.dtype().to_string()])
        .collect();

    let mut stdout = std::io::stdout().lock();
    if manifest.is_empty() {
        writeln!(stdout, "(no columns)").context(OutputSnafu)?;
    } else {
        writeln!(stdout, "{}", render_table(&headers, &rows)).context(OutputSnafu)?;
    }
    Ok(())
}

fn cmd_cat(
    store: &Path,
    columns: Vec<String>,
    max_rows: usize,
    format: OutputFormat,
    threads: Option<usize>,
) -> CliResult<()> {
    let selection = if columns.is_empty() {
        ColumnSelection::All
    } else {
        ColumnSelection::Named(columns)
    };
    let mut options = ReadOptions::default();
    if let Some(n) = threads {
        options = options.with_threads(n);
    }

    let table = read_store_with(store, selection, &options).context(ReadStoreSnafu {
        path: store.display().to_string(),
    })?;
    let batch = table.to_record_batch().context(ConvertSnafu {
        what: "store contents to Arrow",
    })?;

    let total_rows = batch.num_rows();
    let shown = match format {
        OutputFormat::Table => batch.slice(0, total_rows.min(max_rows)),
        OutputFormat::Csv | OutputFormat::Jsonl => batch,
    };

    let mut stdout = std::io::stdout().lock();
    write_batch(&shown, format, total_rows, &mut stdout)
}

fn cmd_import(
    csv: &Path,
    store: &Path,
    categorical: &[String],
    threads: Option<usize>,
    level: i32,
) -> CliResult<()> {
    let start = Instant::now();
    let batch = import::dictionary_encode(&import::read_csv(csv)?, categorical)?;
    debug!(
        "read {} rows x {} columns from {}",
        batch.num_rows(),
        batch.num_columns(),
        csv.display()
    );

    let table = Table::try_from_record_batch(&batch).context(ConvertSnafu {
        what: format!("CSV {}", csv.display()),
    })?;

    let mut options = WriteOptions::default().with_compression_level(level);
    if let Some(n) = threads {
        options = options.with_threads(n);
    }
    write_store_with(&table, store, &options).context(WriteStoreSnafu {
        path: store.display().to_string(),
    })?;

    println!(
        "Wrote {} rows x {} columns to {} (elapsed_ms: {})",
        table.num_rows(),
        table.num_columns(),
        store.display(),
        start.elapsed().as_millis()
    );
    Ok(())
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Columns { store } => cmd_columns(&store),

        Command::Cat {
            store,
            columns,
            max_rows,
            format,
            threads,
        } => cmd_cat(&store, columns, max_rows, format.into(), threads),

        Command::Import {
            csv,
            store,
            categorical,
            threads,
            level,
        } => cmd_import(&csv, &store, &categorical, threads, level),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
