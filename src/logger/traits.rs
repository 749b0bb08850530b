//! Logger trait definition.
//!
//! Defines the interface for all batch sinks, enabling pluggable
//! synchronous and asynchronous logging.

use crate::core::Command;
use crate::error::Result;

/// Trait for writing flushed batches to a sink.
///
/// Implementations must be `Send + Sync`: one logger instance is shared by
/// every context subscribed to it and may be called from several threads.
/// A logger never mutates the batch it is handed.
///
/// # Examples
///
/// ```
/// use bulkmt::core::Command;
/// use bulkmt::logger::{ConsoleLogger, Logger};
///
/// let logger = ConsoleLogger::with_writer(Vec::new());
/// logger.log(&[Command::new("cmd1"), Command::new("cmd2")]).unwrap();
/// ```
pub trait Logger: Send + Sync {
    /// Writes one batch. Must be a no-op for an empty batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sink fails.
    fn log(&self, batch: &[Command]) -> Result<()>;

    /// Returns the name of the logger, used in diagnostics.
    fn name(&self) -> &'static str;
}
