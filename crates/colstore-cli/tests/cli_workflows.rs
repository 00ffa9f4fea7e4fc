#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::io;
use std::path::PathBuf;
use std::process::{Command, Output};

use colstore_core::{ColumnSelection, DType, NumericType, read_manifest, read_store};
use tempfile::TempDir;

mod common;

use common::{path_str, store_root, write_trades_csv};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_colstore")
}

fn run_cli(args: &[&str]) -> io::Result<Output> {
    Command::new(cli_bin()).args(args).output()
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_cli_success(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        stdout_of(output),
        stderr_of(output)
    );
}

/// Write the trades CSV and import it with `sym` as a categorical.
fn import_trades(tmp: &TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let csv = write_trades_csv(tmp)?;
    let store = store_root(tmp, "trades.store");

    let output = run_cli(&[
        "import",
        "--csv",
        path_str(&csv),
        "--store",
        path_str(&store),
        "--categorical",
        "sym",
        "--threads",
        "2",
    ])?;
    assert_cli_success(&output);
    assert!(stdout_of(&output).contains("Wrote 3 rows x 3 columns"));
    Ok(store)
}

#[test]
fn import_writes_a_readable_store() -> TestResult {
    let tmp = TempDir::new()?;
    let store = import_trades(&tmp)?;

    let manifest = read_manifest(&store)?;
    let dtypes: Vec<(&str, &DType)> = manifest
        .entries()
        .iter()
        .map(|e| (e.name(), e.dtype()))
        .collect();
    assert_eq!(
        dtypes,
        vec![
            ("sym", &DType::Category),
            ("qty", &DType::Numeric(NumericType::Int64)),
            ("px", &DType::Numeric(NumericType::Float64)),
        ]
    );

    let table = read_store(&store, ColumnSelection::All)?;
    assert_eq!(table.num_rows(), 3);
    for file in ["sym.bin", "sym.meta.json", "qty.bin", "px.bin", "manifest.tsv"] {
        assert!(store.join(file).is_file(), "missing {file}");
    }
    Ok(())
}

#[test]
fn columns_lists_manifest() -> TestResult {
    let tmp = TempDir::new()?;
    let store = import_trades(&tmp)?;

    let output = run_cli(&["columns", "--store", path_str(&store)])?;
    assert_cli_success(&output);
    let text = stdout_of(&output);

    assert!(text.contains("dtype"), "{text}");
    let sym = text.find("sym").expect("sym listed");
    let qty = text.find("qty").expect("qty listed");
    let px = text.find("px").expect("px listed");
    assert!(sym < qty && qty < px, "{text}");
    assert!(text.contains("category"));
    assert!(text.contains("int64"));
    assert!(text.contains("float64"));
    Ok(())
}

#[test]
fn cat_csv_emits_all_rows_in_requested_order() -> TestResult {
    let tmp = TempDir::new()?;
    let store = import_trades(&tmp)?;

    let output = run_cli(&[
        "cat",
        "--store",
        path_str(&store),
        "--columns",
        "qty,sym",
        "--format",
        "csv",
        "--max-rows",
        "1",
    ])?;
    assert_cli_success(&output);
    assert_eq!(stdout_of(&output), "qty,sym\n1,AAA\n2,BBB\n3,AAA\n");
    Ok(())
}

#[test]
fn cat_jsonl_emits_one_object_per_row() -> TestResult {
    let tmp = TempDir::new()?;
    let store = import_trades(&tmp)?;

    let output = run_cli(&[
        "cat",
        "--store",
        path_str(&store),
        "--columns",
        "sym,px",
        "--format",
        "jsonl",
    ])?;
    assert_cli_success(&output);
    let text = stdout_of(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            r#"{"sym":"AAA","px":1.5}"#,
            r#"{"sym":"BBB","px":2.5}"#,
            r#"{"sym":"AAA","px":3.5}"#,
        ]
    );
    Ok(())
}

#[test]
fn cat_table_preview_is_truncated() -> TestResult {
    let tmp = TempDir::new()?;
    let store = import_trades(&tmp)?;

    let output = run_cli(&["cat", "--store", path_str(&store), "--max-rows", "1"])?;
    assert_cli_success(&output);
    let text = stdout_of(&output);

    assert!(text.contains("AAA"), "{text}");
    assert!(!text.contains("BBB"), "{text}");
    assert!(text.trim_end().ends_with("total_rows: 3"), "{text}");
    Ok(())
}
