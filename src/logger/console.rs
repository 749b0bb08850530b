//! Console logger.
//!
//! Writes each batch as one comma-joined line, blocking the caller until
//! the line is written.

use crate::core::{Command, serialize_batch};
use crate::error::{LoggerError, Result};
use crate::logger::Logger;
use crate::sync::lock;
use std::io::{self, Write};
use std::sync::Mutex;

/// Synchronous console logger.
///
/// The writer is guarded by a mutex so lines from concurrent callers are
/// never interleaved.
pub struct ConsoleLogger {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleLogger {
    /// Creates a logger writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Creates a logger writing to an arbitrary writer.
    #[must_use]
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, batch: &[Command]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let line = serialize_batch(batch);
        let mut out = lock(&self.out);
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| LoggerError::Console(e.to_string()).into())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
