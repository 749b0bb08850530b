//! Batch loggers for bulkmt.
//!
//! This module provides a trait-based system for writing flushed batches
//! to durable sinks:
//!
//! - **Console**: one comma-joined line per batch on stdout
//! - **File**: one `bulk<timestamp>_<suffix>.log` file per batch
//! - **Async**: a worker pool wrapping any other logger behind a queue
//!
//! Contexts hold a [`LoggerSet`] and fan every flushed batch out to it.

pub mod console;
pub mod file;
pub mod traits;
pub mod worker;

pub use console::ConsoleLogger;
pub use file::FileLogger;
pub use traits::Logger;
pub use worker::{AsyncLogger, AsyncLoggerStats};

use crate::config::{BulkConfig, CONSOLE_WORKERS};
use crate::core::Command;
use crate::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Shared, non-owning set of loggers a context fans its batches out to.
#[derive(Clone, Default)]
pub struct LoggerSet {
    loggers: Vec<Arc<dyn Logger>>,
}

impl LoggerSet {
    /// Creates an empty logger set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a logger.
    pub fn subscribe(&mut self, logger: Arc<dyn Logger>) {
        self.loggers.push(logger);
    }

    /// Builder-style variant of [`LoggerSet::subscribe`].
    #[must_use]
    pub fn with(mut self, logger: Arc<dyn Logger>) -> Self {
        self.subscribe(logger);
        self
    }

    /// Returns the number of subscribed loggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    /// Returns whether no logger is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    /// Hands a batch to every logger in subscription order.
    ///
    /// Logger failures are reported and swallowed here; they never reach
    /// the caller. Returns the number of loggers that failed.
    pub fn dispatch(&self, batch: &[Command]) -> usize {
        if batch.is_empty() {
            return 0;
        }

        let mut failures = 0;
        for logger in &self.loggers {
            if let Err(e) = logger.log(batch) {
                failures += 1;
                error!(logger = logger.name(), error = %e, "failed to log batch");
            }
        }
        failures
    }
}

impl fmt::Debug for LoggerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.loggers.iter().map(|l| l.name()))
            .finish()
    }
}

/// Loggers built from a [`BulkConfig`], together with the async workers
/// that have to be drained on shutdown.
#[derive(Debug)]
pub struct LoggerPool {
    set: LoggerSet,
    workers: Vec<Arc<AsyncLogger>>,
}

impl LoggerPool {
    /// Builds the console and/or file loggers the configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn from_config(config: &BulkConfig) -> Result<Self> {
        let mut pool = Self {
            set: LoggerSet::new(),
            workers: Vec::new(),
        };

        if config.console {
            pool.add(Arc::new(ConsoleLogger::stdout()), CONSOLE_WORKERS, config)?;
        }
        if config.file {
            pool.add(
                Arc::new(FileLogger::new(&config.output_dir)),
                config.workers,
                config,
            )?;
        }

        Ok(pool)
    }

    /// Wraps an existing logger set with no background workers.
    #[must_use]
    pub const fn from_set(set: LoggerSet) -> Self {
        Self {
            set,
            workers: Vec::new(),
        }
    }

    fn add(&mut self, logger: Arc<dyn Logger>, workers: usize, config: &BulkConfig) -> Result<()> {
        if config.asynchronous {
            let worker = Arc::new(AsyncLogger::spawn(logger, workers)?);
            self.set.subscribe(Arc::clone(&worker) as Arc<dyn Logger>);
            self.workers.push(worker);
        } else {
            self.set.subscribe(logger);
        }
        Ok(())
    }

    /// Returns a clone of the logger set for subscribing contexts.
    #[must_use]
    pub fn set(&self) -> LoggerSet {
        self.set.clone()
    }

    /// Returns counters for each asynchronous logger.
    #[must_use]
    pub fn stats(&self) -> Vec<AsyncLoggerStats> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    /// Drains and joins every asynchronous logger.
    ///
    /// # Errors
    ///
    /// Returns the first worker join failure; all workers are still joined.
    pub fn shutdown(&self) -> Result<()> {
        let mut first_err = None;
        for worker in &self.workers {
            if let Err(e) = worker.shutdown()
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        info!(loggers = self.workers.len(), "async loggers drained");
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Loggers used by unit tests across the crate.

    use super::Logger;
    use crate::core::{Batch, Command};
    use crate::error::{LoggerError, Result};
    use std::sync::Mutex;

    /// Records every batch it receives.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLogger {
        batches: Mutex<Vec<Batch>>,
    }

    impl RecordingLogger {
        pub(crate) fn bodies(&self) -> Vec<Vec<String>> {
            crate::sync::lock(&self.batches)
                .iter()
                .map(|b| b.iter().map(|c| c.body().to_string()).collect())
                .collect()
        }

        pub(crate) fn count(&self) -> usize {
            crate::sync::lock(&self.batches).len()
        }
    }

    impl Logger for RecordingLogger {
        fn log(&self, batch: &[Command]) -> Result<()> {
            crate::sync::lock(&self.batches).push(batch.to_vec());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Fails every write.
    #[derive(Debug, Default)]
    pub(crate) struct FailingLogger;

    impl Logger for FailingLogger {
        fn log(&self, _batch: &[Command]) -> Result<()> {
            Err(LoggerError::Console("sink unavailable".to_string()).into())
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingLogger, RecordingLogger};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dispatch_fans_out_in_order() {
        let a = Arc::new(RecordingLogger::default());
        let b = Arc::new(RecordingLogger::default());
        let set = LoggerSet::new()
            .with(Arc::clone(&a) as Arc<dyn Logger>)
            .with(Arc::clone(&b) as Arc<dyn Logger>);

        let failures = set.dispatch(&[Command::new("x"), Command::new("y")]);

        assert_eq!(failures, 0);
        assert_eq!(a.bodies(), vec![vec!["x", "y"]]);
        assert_eq!(b.bodies(), vec![vec!["x", "y"]]);
    }

    #[test]
    fn test_dispatch_empty_batch_is_noop() {
        let a = Arc::new(RecordingLogger::default());
        let set = LoggerSet::new().with(Arc::clone(&a) as Arc<dyn Logger>);
        set.dispatch(&[]);
        assert_eq!(a.count(), 0);
    }

    #[test]
    fn test_dispatch_continues_after_failure() {
        let good = Arc::new(RecordingLogger::default());
        let set = LoggerSet::new()
            .with(Arc::new(FailingLogger))
            .with(Arc::clone(&good) as Arc<dyn Logger>);

        let failures = set.dispatch(&[Command::new("x")]);

        assert_eq!(failures, 1);
        assert_eq!(good.count(), 1);
    }

    #[test]
    fn test_logger_set_debug_lists_names() {
        let set = LoggerSet::new().with(Arc::new(FailingLogger));
        assert_eq!(format!("{set:?}"), "[\"failing\"]");
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_pool_from_config_async_file_only() {
        let dir = TempDir::new().unwrap();
        let config = BulkConfig {
            console: false,
            output_dir: dir.path().to_path_buf(),
            ..BulkConfig::default()
        };

        let pool = LoggerPool::from_config(&config).unwrap();
        assert_eq!(pool.set().len(), 1);

        pool.set().dispatch(&[Command::with_timestamp("a", 7)]);
        pool.shutdown().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].written, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_pool_from_config_sync_has_no_workers() {
        let dir = TempDir::new().unwrap();
        let config = BulkConfig {
            console: false,
            asynchronous: false,
            output_dir: dir.path().to_path_buf(),
            ..BulkConfig::default()
        };

        let pool = LoggerPool::from_config(&config).unwrap();
        pool.set().dispatch(&[Command::with_timestamp("a", 7)]);

        assert!(pool.stats().is_empty());
        assert!(pool.shutdown().is_ok());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
