//! Shared master context for the aggregation server.
//!
//! Many slave contexts forward single commands into one [`SharedContext`].
//! The pending batch is the only state mutated by several connections at
//! once; the lock is held just long enough to append and, when the bulk
//! size is reached, take the full batch out. Loggers run after the lock is
//! released.

use crate::core::{Batch, Command};
use crate::logger::LoggerSet;
use crate::sync::lock;
use serde::Serialize;
use std::mem;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Counters describing a shared context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SharedStats {
    /// Commands forwarded by slaves.
    pub received: u64,
    /// Static batches flushed by the master.
    pub flushes: u64,
    /// Brace groups dispatched on behalf of slaves.
    pub groups: u64,
}

/// Master context aggregating commands from many connections.
#[derive(Debug)]
pub struct SharedContext {
    bulk_size: usize,
    pending: Mutex<Batch>,
    loggers: LoggerSet,
    received: AtomicU64,
    flushes: AtomicU64,
    groups: AtomicU64,
}

impl SharedContext {
    /// Creates a master context flushing every `bulk_size` commands
    /// (a size of 0 is treated as 1).
    #[must_use]
    pub fn new(bulk_size: usize, loggers: LoggerSet) -> Self {
        Self {
            bulk_size: bulk_size.max(1),
            pending: Mutex::new(Vec::new()),
            loggers,
            received: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            groups: AtomicU64::new(0),
        }
    }

    /// Returns the bulk size.
    #[must_use]
    pub const fn bulk_size(&self) -> usize {
        self.bulk_size
    }

    /// Appends one command and flushes if the bulk size is reached.
    ///
    /// The full batch is handed to the loggers after the lock is released,
    /// so when two callers fill consecutive batches concurrently the
    /// loggers may receive them in either order. Order within a batch is
    /// always arrival order.
    pub fn push(&self, command: Command) {
        let ready = {
            let mut pending = lock(&self.pending);
            pending.push(command);
            if pending.len() >= self.bulk_size {
                Some(mem::take(&mut *pending))
            } else {
                None
            }
        };
        if let Some(batch) = ready {
            self.emit(&batch);
        }
        // counted after delivery
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    /// Dispatches a complete brace group from one slave as its own batch.
    ///
    /// The group bypasses the pending static batch so groups from
    /// different connections are never merged or interleaved.
    pub fn dispatch_group(&self, group: &[Command]) {
        if group.is_empty() {
            return;
        }
        self.groups.fetch_add(1, Ordering::SeqCst);
        self.loggers.dispatch(group);
    }

    /// Flushes whatever is pending, regardless of the bulk size.
    pub fn flush(&self) {
        let batch = mem::take(&mut *lock(&self.pending));
        if !batch.is_empty() {
            self.emit(&batch);
        }
    }

    /// Returns the number of commands waiting for the next flush.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> SharedStats {
        SharedStats {
            received: self.received.load(Ordering::SeqCst),
            flushes: self.flushes.load(Ordering::SeqCst),
            groups: self.groups.load(Ordering::SeqCst),
        }
    }

    fn emit(&self, batch: &[Command]) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        debug!(commands = batch.len(), "master batch flushed");
        self.loggers.dispatch(batch);
    }
}
