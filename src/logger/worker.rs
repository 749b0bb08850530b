//! Asynchronous logger backed by a worker pool.
//!
//! [`AsyncLogger`] wraps any synchronous [`Logger`]. `log` copies the batch
//! onto an in-memory queue and returns immediately; background threads pop
//! batches and hand them to the wrapped logger.
//!
//! Shutdown wakes every worker, lets the workers drain everything already
//! queued, and joins them. No queued batch is dropped.

use crate::core::{Batch, Command};
use crate::error::{LoggerError, Result};
use crate::logger::Logger;
use crate::sync::{lock, wait};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Counters describing an asynchronous logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AsyncLoggerStats {
    /// Name of the wrapped logger.
    pub name: &'static str,
    /// Batches written successfully.
    pub written: u64,
    /// Batches the wrapped logger failed to write.
    pub failed: u64,
    /// Batches still waiting in the queue.
    pub queued: usize,
}

#[derive(Default)]
struct Queue {
    batches: VecDeque<Batch>,
    stopping: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
    inner: Arc<dyn Logger>,
    written: AtomicU64,
    failed: AtomicU64,
}

/// Worker-pool wrapper turning a synchronous logger into an asynchronous one.
///
/// # Examples
///
/// ```
/// use bulkmt::core::Command;
/// use bulkmt::logger::{AsyncLogger, ConsoleLogger, Logger};
/// use std::sync::Arc;
///
/// let logger = AsyncLogger::spawn(Arc::new(ConsoleLogger::with_writer(Vec::new())), 2).unwrap();
/// logger.log(&[Command::new("cmd1")]).unwrap();
/// logger.shutdown().unwrap();
/// assert_eq!(logger.stats().written, 1);
/// ```
pub struct AsyncLogger {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AsyncLogger {
    /// Starts `workers` background threads (at least one) draining into `inner`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::WorkerSpawn`] if a thread cannot be started;
    /// threads started before the failure are stopped and joined.
    pub fn spawn(inner: Arc<dyn Logger>, workers: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            ready: Condvar::new(),
            inner,
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let logger = Self {
            shared,
            workers: Mutex::new(Vec::new()),
        };

        for index in 0..workers.max(1) {
            let shared = Arc::clone(&logger.shared);
            let spawned = thread::Builder::new()
                .name(format!("bulk-{}-{index}", logger.shared.inner.name()))
                .spawn(move || worker_loop(&shared));

            match spawned {
                Ok(handle) => lock(&logger.workers).push(handle),
                Err(e) => {
                    // dropping `logger` stops and joins what was started
                    return Err(LoggerError::WorkerSpawn {
                        name: logger.shared.inner.name().to_string(),
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }

        debug!(
            logger = logger.shared.inner.name(),
            workers = workers.max(1),
            "async logger started"
        );
        Ok(logger)
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> AsyncLoggerStats {
        AsyncLoggerStats {
            name: self.shared.inner.name(),
            written: self.shared.written.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            queued: lock(&self.shared.queue).batches.len(),
        }
    }

    /// Returns whether shutdown has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.queue).stopping
    }

    /// Stops accepting batches, drains the queue and joins every worker.
    ///
    /// Calling this more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::WorkerPanicked`] if a worker thread panicked.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut queue = lock(&self.shared.queue);
            queue.stopping = true;
        }
        self.shared.ready.notify_all();

        let handles: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        if handles.is_empty() {
            return Ok(());
        }

        let mut panicked = false;
        for handle in handles {
            panicked |= handle.join().is_err();
        }

        info!(
            logger = self.shared.inner.name(),
            written = self.shared.written.load(Ordering::SeqCst),
            failed = self.shared.failed.load(Ordering::SeqCst),
            "async logger stopped"
        );

        if panicked {
            return Err(LoggerError::WorkerPanicked {
                name: self.shared.inner.name().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Logger for AsyncLogger {
    fn log(&self, batch: &[Command]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        {
            let mut queue = lock(&self.shared.queue);
            if queue.stopping {
                return Err(LoggerError::Closed {
                    name: self.shared.inner.name().to_string(),
                }
                .into());
            }
            queue.batches.push_back(batch.to_vec());
        }
        self.shared.ready.notify_one();
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.shared.inner.name()
    }
}

impl Drop for AsyncLogger {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "async logger shutdown failed");
        }
    }
}

impl fmt::Debug for AsyncLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogger")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn worker_loop(shared: &Shared) {
    while let Some(batch) = next_batch(shared) {
        match shared.inner.log(&batch) {
            Ok(()) => {
                shared.written.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    logger = shared.inner.name(),
                    commands = batch.len(),
                    error = %e,
                    "failed to log batch"
                );
            }
        }
    }
}

/// Blocks until a batch is available, or returns `None` once shutdown was
/// requested and the queue is empty.
fn next_batch(shared: &Shared) -> Option<Batch> {
    let mut queue = lock(&shared.queue);
    loop {
        if let Some(batch) = queue.batches.pop_front() {
            return Some(batch);
        }
        if queue.stopping {
            return None;
        }
        queue = wait(&shared.ready, queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::{FailingLogger, RecordingLogger};
    use std::time::Duration;

    /// Records batches slowly so that shutdown races a full queue.
    #[derive(Default)]
    struct SlowLogger {
        inner: RecordingLogger,
    }

    impl Logger for SlowLogger {
        fn log(&self, batch: &[Command]) -> Result<()> {
            thread::sleep(Duration::from_millis(2));
            self.inner.log(batch)
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[test]
    fn test_async_logger_delivers_batches() {
        let sink = Arc::new(RecordingLogger::default());
        let logger = AsyncLogger::spawn(Arc::clone(&sink) as Arc<dyn Logger>, 1).unwrap();

        logger.log(&[Command::new("a"), Command::new("b")]).unwrap();
        logger.log(&[Command::new("c")]).unwrap();
        logger.shutdown().unwrap();

        assert_eq!(sink.bodies(), vec![vec!["a", "b"], vec!["c"]]);
        assert_eq!(logger.stats().written, 2);
        assert_eq!(logger.stats().queued, 0);
    }

    #[test]
    fn test_shutdown_drains_every_queued_batch() {
        let sink = Arc::new(SlowLogger::default());
        let logger = AsyncLogger::spawn(Arc::clone(&sink) as Arc<dyn Logger>, 3).unwrap();

        let k = 50;
        for i in 0..k {
            logger.log(&[Command::new(format!("cmd{i}"))]).unwrap();
        }
        logger.shutdown().unwrap();

        assert_eq!(sink.inner.count(), k);
        let mut seen: Vec<String> = sink.inner.bodies().into_iter().flatten().collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), k);
    }

    #[test]
    fn test_log_after_shutdown_is_rejected() {
        let sink = Arc::new(RecordingLogger::default());
        let logger = AsyncLogger::spawn(Arc::clone(&sink) as Arc<dyn Logger>, 1).unwrap();
        logger.shutdown().unwrap();

        assert!(logger.is_closed());
        let result = logger.log(&[Command::new("late")]);
        assert!(matches!(
            result,
            Err(crate::Error::Logger(LoggerError::Closed { .. }))
        ));
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let logger = AsyncLogger::spawn(Arc::new(RecordingLogger::default()), 2).unwrap();
        assert!(logger.shutdown().is_ok());
        assert!(logger.shutdown().is_ok());
    }

    #[test]
    fn test_empty_batch_is_not_queued() {
        let sink = Arc::new(RecordingLogger::default());
        let logger = AsyncLogger::spawn(Arc::clone(&sink) as Arc<dyn Logger>, 1).unwrap();
        logger.log(&[]).unwrap();
        logger.shutdown().unwrap();
        assert_eq!(sink.count(), 0);
        assert_eq!(logger.stats().written, 0);
    }

    #[test]
    fn test_worker_survives_failing_sink() {
        let logger = AsyncLogger::spawn(Arc::new(FailingLogger), 1).unwrap();
        logger.log(&[Command::new("a")]).unwrap();
        logger.log(&[Command::new("b")]).unwrap();
        logger.shutdown().unwrap();

        let stats = logger.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.written, 0);
        assert_eq!(stats.name, "failing");
    }

    #[test]
    fn test_drop_drains_queue() {
        let sink = Arc::new(RecordingLogger::default());
        {
            let logger = AsyncLogger::spawn(Arc::clone(&sink) as Arc<dyn Logger>, 2).unwrap();
            for _ in 0..10 {
                logger.log(&[Command::new("x")]).unwrap();
            }
        }
        assert_eq!(sink.count(), 10);
    }

    #[test]
    fn test_zero_workers_spawns_one() {
        let sink = Arc::new(RecordingLogger::default());
        let logger = AsyncLogger::spawn(Arc::clone(&sink) as Arc<dyn Logger>, 0).unwrap();
        logger.log(&[Command::new("x")]).unwrap();
        logger.shutdown().unwrap();
        assert_eq!(sink.count(), 1);
    }
}
