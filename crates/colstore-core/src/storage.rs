//! Filesystem primitives for store directories.
//!
//! Every byte that `colstore-core` puts on disk goes through this module.
//! It is responsible for:
//!
//! - Replacing a store directory wholesale (recursive delete, then create).
//! - Writing files with write-then-rename semantics so that a reader never
//!   observes a half-written file under its final name.
//! - Classifying I/O failures into [`StorageError`] variants, in particular
//!   distinguishing a missing file (`NotFound`) from other I/O problems.
//!
//! Relative path conventions (file names per column, manifest name) live in
//! [`layout`]; this module only deals with absolute paths handed to it.

pub mod layout;

use snafu::{Backtrace, IntoError, prelude::*};
use std::{
    fs,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying I/O error reported by the filesystem.
        source: io::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// A non-directory entry occupies a path where a store directory was
    /// expected.
    #[snafu(display("Path already exists and is not a directory: {path}"))]
    AlreadyExists {
        /// The path that was found to already exist.
        path: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// Any other I/O error on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying I/O error with platform-specific details.
        source: io::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}

/// Map an `io::Error` to `NotFound` or `OtherIo` depending on its kind.
fn classify(path: &Path, err: io::Error) -> StorageError {
    let path = path.display().to_string();
    if err.kind() == io::ErrorKind::NotFound {
        NotFoundSnafu { path }.into_error(err)
    } else {
        OtherIoSnafu { path }.into_error(err)
    }
}

/// Remove `dir` recursively if it exists, then create it fresh.
///
/// Returns `true` when an existing directory was removed. This is a
/// destructive, non-atomic replace: if the process dies between the delete
/// and the subsequent writes, the directory is left missing or partial.
///
/// Anything at `dir` other than a real directory is never deleted and
/// yields [`StorageError::AlreadyExists`]. That includes a regular file and
/// a symlink, even one pointing at a directory.
pub fn recreate_dir(dir: &Path) -> StorageResult<bool> {
    let replaced = match fs::symlink_metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(dir).context(OtherIoSnafu {
                path: dir.display().to_string(),
            })?;
            true
        }
        Ok(_) => {
            return AlreadyExistsSnafu {
                path: dir.display().to_string(),
            }
            .fail();
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(classify(dir, e)),
    };

    fs::create_dir_all(dir).context(OtherIoSnafu {
        path: dir.display().to_string(),
    })?;

    Ok(replaced)
}

/// Read the full contents of the file at `path`.
///
/// Errors:
/// - If the file does not exist this returns `StorageError::NotFound`.
/// - On any other I/O error this returns `StorageError::OtherIo`.
pub fn read_all_bytes(path: &Path) -> StorageResult<Vec<u8>> {
    fs::read(path).map_err(|e| classify(path, e))
}

/// Fsync the directory `dir` so renames into it are durable.
///
/// Directories cannot be opened for syncing on every platform; elsewhere
/// this is a no-op.
pub fn sync_dir(dir: &Path) -> StorageResult<()> {
    #[cfg(unix)]
    {
        let handle = fs::File::open(dir).map_err(|e| classify(dir, e))?;
        handle.sync_all().context(OtherIoSnafu {
            path: dir.display().to_string(),
        })?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Open the file at `path` for buffered reading.
pub fn open_reader(path: &Path) -> StorageResult<BufReader<fs::File>> {
    let file = fs::File::open(path).map_err(|e| classify(path, e))?;
    Ok(BufReader::new(file))
}

/// Write `contents` to `path` using an atomic write.
///
/// The payload goes to a temporary file next to the target, is synced, and
/// is then renamed into place, replacing any previous file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let mut sink = OutputSink::open(path)?;
    sink.write_all(contents)?;
    sink.finish()
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Temporary sibling path for `path`: `<file name>.tmp`.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A streaming output sink that writes to a temp file and renames it into
/// place on [`OutputSink::finish`].
///
/// Dropping a sink without finishing it removes the temp file and leaves the
/// final path untouched.
pub struct OutputSink {
    tmp_path: PathBuf,
    final_path: PathBuf,
    writer: BufWriter<fs::File>,
    guard: TempFileGuard,
}

impl OutputSink {
    /// Open a sink whose contents will land at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
        }

        let tmp_path = tmp_path_for(path);
        let file = fs::File::create(&tmp_path).context(OtherIoSnafu {
            path: tmp_path.display().to_string(),
        })?;
        let guard = TempFileGuard::new(tmp_path.clone());

        Ok(Self {
            tmp_path,
            final_path: path.to_path_buf(),
            writer: BufWriter::new(file),
            guard,
        })
    }

    /// Return a mutable `Write` handle for streaming bytes.
    pub fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    /// Append `buf` to the sink.
    pub fn write_all(&mut self, buf: &[u8]) -> StorageResult<()> {
        self.writer.write_all(buf).context(OtherIoSnafu {
            path: self.tmp_path.display().to_string(),
        })
    }

    /// Flush, fsync, and commit to the final location.
    pub fn finish(self) -> StorageResult<()> {
        let OutputSink {
            tmp_path,
            final_path,
            writer,
            mut guard,
        } = self;

        let file = writer
            .into_inner()
            .map_err(io::IntoInnerError::into_error)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.sync_all().context(OtherIoSnafu {
            path: tmp_path.display().to_string(),
        })?;
        drop(file);

        fs::rename(&tmp_path, &final_path).context(OtherIoSnafu {
            path: final_path.display().to_string(),
        })?;

        // Renamed into place; nothing left to clean up.
        guard.disarm();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn write_atomic_creates_file_with_contents() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("test.txt");

        write_atomic(&path, b"hello world")?;

        assert_eq!(std::fs::read_to_string(&path)?, "hello world");
        Ok(())
    }

    #[test]
    fn write_atomic_overwrites_existing_file() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("overwrite.txt");

        write_atomic(&path, b"original")?;
        write_atomic(&path, b"updated")?;

        assert_eq!(std::fs::read_to_string(&path)?, "updated");
        Ok(())
    }

    #[test]
    fn write_atomic_no_leftover_tmp_file() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("clean.csv");

        write_atomic(&path, b"data")?;

        assert!(!tmp.path().join("clean.csv.tmp").exists());
        Ok(())
    }

    #[test]
    fn dropped_sink_leaves_no_file_behind() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("abandoned.bin");

        {
            let mut sink = OutputSink::open(&path)?;
            sink.write_all(b"partial")?;
        }

        assert!(!path.exists());
        assert!(!tmp.path().join("abandoned.bin.tmp").exists());
        Ok(())
    }

    #[test]
    fn read_all_bytes_returns_not_found_for_missing_file() -> TestResult {
        let tmp = TempDir::new()?;

        let err = read_all_bytes(&tmp.path().join("missing.bin"))
            .expect_err("expected NotFound error");

        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }

    #[test]
    fn recreate_dir_creates_missing_directory() -> TestResult {
        let tmp = TempDir::new()?;
        let dir = tmp.path().join("nested/store");

        let replaced = recreate_dir(&dir)?;

        assert!(!replaced);
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn recreate_dir_wipes_existing_contents() -> TestResult {
        let tmp = TempDir::new()?;
        let dir = tmp.path().join("store");
        std::fs::create_dir_all(dir.join("sub"))?;
        std::fs::write(dir.join("stale.csv"), b"old")?;

        let replaced = recreate_dir(&dir)?;

        assert!(replaced);
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn recreate_dir_refuses_regular_file() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("not_a_dir");
        std::fs::write(&path, b"keep me")?;

        let err = recreate_dir(&path).expect_err("expected AlreadyExists");

        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(std::fs::read(&path)?, b"keep me");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn recreate_dir_refuses_symlinked_directory() -> TestResult {
        let tmp = TempDir::new()?;
        let target = tmp.path().join("real");
        std::fs::create_dir_all(&target)?;
        std::fs::write(target.join("keep.csv"), b"keep me")?;
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link)?;

        let err = recreate_dir(&link).expect_err("expected AlreadyExists");

        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert!(std::fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(std::fs::read(target.join("keep.csv"))?, b"keep me");
        Ok(())
    }

    #[test]
    fn sync_dir_accepts_existing_directory() -> TestResult {
        let tmp = TempDir::new()?;
        write_atomic(&tmp.path().join("a.bin"), b"x")?;

        sync_dir(tmp.path())?;
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn sync_dir_reports_missing_directory() -> TestResult {
        let tmp = TempDir::new()?;

        let err = sync_dir(&tmp.path().join("absent")).expect_err("expected NotFound");

        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }
}
