//! File input and batch log output.
//!
//! Command files are opened as [`InputBytes`]: small files are read into
//! memory, large ones are memory mapped and scanned in place by the
//! blocking reader. Batch log files are written through [`write_file`].

// Memory mapping requires unsafe; the mapping is read-only
#![allow(unsafe_code)]

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::{self, File};
use std::ops::Deref;
use std::path::Path;

/// Files at least this large are memory mapped (1 MiB).
pub const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Byte source of a blocking reader.
#[derive(Debug)]
pub enum InputBytes {
    /// Bytes held in memory.
    Owned(Vec<u8>),
    /// Read-only mapping of a command file.
    Mapped(Mmap),
}

impl InputBytes {
    /// Opens a command file, mapping it when it reaches [`MMAP_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] for a missing path, and
    /// [`IoError::ReadFailed`] or [`IoError::MmapFailed`] if the file
    /// cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let display = path.to_string_lossy().to_string();
        let read_failed = |e: std::io::Error| IoError::ReadFailed {
            path: display.clone(),
            reason: e.to_string(),
        };

        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IoError::FileNotFound {
                    path: display.clone(),
                }
            } else {
                read_failed(e)
            }
        })?;
        let size = file.metadata().map_err(read_failed)?.len();

        if size < MMAP_THRESHOLD {
            let bytes = fs::read(path).map_err(read_failed)?;
            return Ok(Self::Owned(bytes));
        }

        // Safety: the mapping is never written through; truncating the
        // file underneath a running reader is outside what we support
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| IoError::MmapFailed {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::Mapped(mmap))
    }

    /// Returns whether the bytes come from a memory mapping.
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl Default for InputBytes {
    fn default() -> Self {
        Self::Owned(Vec::new())
    }
}

impl Deref for InputBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes,
            Self::Mapped(mmap) => mmap,
        }
    }
}

/// Writes content to a file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path_ref = path.as_ref();

    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    fs::write(path_ref, content).map_err(|e| IoError::WriteFailed {
        path: path_ref.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;

    Ok(())
}
