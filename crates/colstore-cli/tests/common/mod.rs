#![allow(dead_code, clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const TRADES_CSV: &str = "sym,qty,px\nAAA,1,1.5\nBBB,2,2.5\nAAA,3,3.5\n";

/// Write the trades fixture to `<tmp>/trades.csv`.
pub fn write_trades_csv(tmp: &TempDir) -> TestResult<PathBuf> {
    let csv = tmp.path().join("trades.csv");
    std::fs::write(&csv, TRADES_CSV)?;
    Ok(csv)
}

pub fn store_root(tmp: &TempDir, name: &str) -> PathBuf {
    tmp.path().join(name)
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf8 temp path")
}
