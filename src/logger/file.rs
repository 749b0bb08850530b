//! File logger.
//!
//! Writes every batch to its own file named
//! `bulk<timestamp>_<random>_<worker>.log`, where `<timestamp>` is the
//! creation time of the batch's first command. The random and worker
//! components keep names unique when several threads flush within the
//! same second.

use crate::core::{Command, serialize_batch};
use crate::error::Result;
use crate::io::write_file;
use crate::logger::Logger;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::debug;
use uuid::Uuid;

/// Prefix of every batch log file.
pub const FILE_PREFIX: &str = "bulk";

/// Extension of every batch log file.
pub const FILE_EXTENSION: &str = "log";

/// Synchronous file logger.
///
/// # Examples
///
/// ```no_run
/// use bulkmt::core::Command;
/// use bulkmt::logger::{FileLogger, Logger};
///
/// let logger = FileLogger::new("logs");
/// let path = logger.write(&[Command::new("cmd1")]).unwrap();
/// assert!(path.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct FileLogger {
    dir: PathBuf,
}

impl FileLogger {
    /// Creates a logger writing into `dir`. The directory is created on
    /// first write if missing.
    #[must_use]
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a batch and returns the path of the created file, or `None`
    /// for an empty batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&self, batch: &[Command]) -> Result<Option<PathBuf>> {
        let Some(first) = batch.first() else {
            return Ok(None);
        };

        let path = self.dir.join(file_name(first.created_at()));
        write_file(&path, &serialize_batch(batch))?;
        debug!(path = %path.display(), commands = batch.len(), "batch written");
        Ok(Some(path))
    }
}

impl Logger for FileLogger {
    fn log(&self, batch: &[Command]) -> Result<()> {
        self.write(batch).map(|_| ())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Builds a collision-resistant file name for a batch created at `timestamp`.
#[must_use]
pub fn file_name(timestamp: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{FILE_PREFIX}{timestamp}_{}_{}.{FILE_EXTENSION}",
        &random[..8],
        worker_label()
    )
}

/// Identifies the writing thread: its name when it has one, otherwise the
/// digits of its thread id.
fn worker_label() -> String {
    let current = thread::current();
    let raw = current.name().map_or_else(
        || format!("{:?}", current.id()),
        ToString::to_string,
    );
    let label: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if label.is_empty() {
        "main".to_string()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_file_logger_writes_joined_batch() {
        let dir = TempDir::new().unwrap();
        let logger = FileLogger::new(dir.path());

        let path = logger
            .write(&[
                Command::with_timestamp("cmd1", 1_700_000_000),
                Command::with_timestamp("cmd2", 1_700_000_005),
            ])
            .unwrap()
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("bulk1700000000_"));
        assert!(name.ends_with(".log"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "cmd1,cmd2");
    }

    #[test]
    fn test_file_logger_skips_empty_batch() {
        let dir = TempDir::new().unwrap();
        let logger = FileLogger::new(dir.path());

        assert!(logger.write(&[]).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_file_logger_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let logger = FileLogger::new(dir.path().join("nested/out"));

        logger.log(&[Command::new("x")]).unwrap();

        assert_eq!(std::fs::read_dir(logger.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_file_logger_reports_unwritable_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let logger = FileLogger::new(&blocker);

        assert!(logger.log(&[Command::new("x")]).is_err());
    }

    #[test]
    fn test_file_names_are_unique_within_a_second() {
        let names: HashSet<String> = (0..200).map(|_| file_name(42)).collect();
        assert_eq!(names.len(), 200);
    }

    #[test]
    fn test_worker_label_uses_thread_name() {
        let label = thread::Builder::new()
            .name("bulk-file-3".to_string())
            .spawn(worker_label)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(label, "bulk-file-3");
    }
}
