//! Session registry.
//!
//! [`Registry`] maps opaque [`Handle`]s to independent root contexts fed by
//! yielding readers. It is an explicit service object: create one, pass it
//! by reference to whatever needs it, and call [`Registry::shutdown`] when
//! done.
//!
//! The handle table is locked only for insert, lookup and removal. Each
//! session has its own lock, so sessions are driven concurrently. Once
//! [`Registry::shutdown`] has run, new sessions are refused.

use crate::batching::{Context, ContextStats};
use crate::config::{BulkConfig, TruncationPolicy};
use crate::error::{Error, Result};
use crate::io::YieldReader;
use crate::logger::{LoggerPool, LoggerSet};
use crate::sync::lock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Opaque identifier of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(u64);

impl Handle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Session = Arc<Mutex<Context<YieldReader>>>;

#[derive(Default)]
struct Sessions {
    live: HashMap<Handle, Session>,
    closed: bool,
}

/// Handle-keyed table of independent batching sessions.
///
/// # Examples
///
/// ```
/// use bulkmt::logger::LoggerSet;
/// use bulkmt::registry::Registry;
///
/// let registry = Registry::new(LoggerSet::new());
/// let handle = registry.connect(2).unwrap();
/// registry.receive(handle, b"cmd1\ncmd2\n");
/// registry.disconnect(handle);
/// assert!(registry.is_empty());
/// ```
pub struct Registry {
    sessions: Mutex<Sessions>,
    next_handle: AtomicU64,
    pool: LoggerPool,
    on_truncate: TruncationPolicy,
}

impl Registry {
    /// Creates a registry whose sessions subscribe to `loggers`.
    #[must_use]
    pub fn new(loggers: LoggerSet) -> Self {
        Self::with_pool(LoggerPool::from_set(loggers), TruncationPolicy::default())
    }

    /// Creates a registry with the shared asynchronous console and file
    /// loggers described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the logger
    /// workers cannot be started.
    pub fn from_config(config: &BulkConfig) -> Result<Self> {
        config.validate()?;
        let pool = LoggerPool::from_config(config)?;
        Ok(Self::with_pool(pool, config.on_truncate))
    }

    fn with_pool(pool: LoggerPool, on_truncate: TruncationPolicy) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            next_handle: AtomicU64::new(0),
            pool,
            on_truncate,
        }
    }

    /// Opens a new session batching every `bulk_size` commands and returns
    /// its handle. A size of 0 is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once the registry has been shut down.
    pub fn connect(&self, bulk_size: usize) -> Result<Handle> {
        let mut sessions = lock(&self.sessions);
        if sessions.closed {
            return Err(Error::InvalidState {
                message: "registry is shut down".to_string(),
            });
        }

        // skip any value still live after wrap-around
        let handle = loop {
            let candidate = Handle(self.next_handle.fetch_add(1, Ordering::SeqCst));
            if !sessions.live.contains_key(&candidate) {
                break candidate;
            }
        };
        let context = Context::root(YieldReader::new(), bulk_size, self.pool.set())
            .with_truncation_policy(self.on_truncate);
        sessions.live.insert(handle, Arc::new(Mutex::new(context)));
        drop(sessions);

        info!(%handle, bulk_size, "session connected");
        Ok(handle)
    }

    /// Feeds raw bytes into a session and processes every complete line.
    ///
    /// Unknown handles and empty payloads are ignored.
    pub fn receive(&self, handle: Handle, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let Some(session) = self.session(handle) else {
            debug!(%handle, "receive on unknown handle ignored");
            return;
        };
        lock(&session).receive(bytes);
    }

    /// Terminates and removes a session, flushing its pending commands.
    ///
    /// Unknown handles are ignored. Returns the final statistics of the
    /// session if it existed.
    pub fn disconnect(&self, handle: Handle) -> Option<ContextStats> {
        let session = lock(&self.sessions).live.remove(&handle)?;
        Some(Self::close_session(handle, &session))
    }

    fn close_session(handle: Handle, session: &Mutex<Context<YieldReader>>) -> ContextStats {
        let mut context = lock(session);
        context.terminate();
        let stats = context.stats();
        info!(%handle, commands = stats.commands, flushes = stats.flushes, "session disconnected");
        stats
    }

    /// Returns whether `handle` names a live session.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        lock(&self.sessions).live.contains_key(&handle)
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.sessions).live.len()
    }

    /// Returns whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.sessions).live.is_empty()
    }

    /// Refuses further sessions, disconnects every live one, then drains
    /// the asynchronous loggers. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a logger worker panicked.
    pub fn shutdown(&self) -> Result<()> {
        let remaining = {
            let mut sessions = lock(&self.sessions);
            sessions.closed = true;
            mem::take(&mut sessions.live)
        };
        for (handle, session) in remaining {
            Self::close_session(handle, &session);
        }
        self.pool.shutdown()
    }

    /// Returns whether [`Registry::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        lock(&self.sessions).closed
    }

    fn session(&self, handle: Handle) -> Option<Session> {
        lock(&self.sessions).live.get(&handle).cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("sessions", &self.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;
    use crate::logger::testing::RecordingLogger;
    use std::thread;
    use tempfile::TempDir;

    fn registry() -> (Registry, Arc<RecordingLogger>) {
        let sink = Arc::new(RecordingLogger::default());
        let set = LoggerSet::new().with(Arc::clone(&sink) as Arc<dyn Logger>);
        (Registry::new(set), sink)
    }

    #[test]
    fn test_connect_returns_unique_handles() {
        let (registry, _sink) = registry();
        let a = registry.connect(3).unwrap();
        let b = registry.connect(3).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a));
    }

    #[test]
    fn test_receive_and_disconnect_flush() {
        let (registry, sink) = registry();
        let handle = registry.connect(3).unwrap();

        registry.receive(handle, b"cmd1\ncmd2\ncmd3\ncmd4\n");
        assert_eq!(sink.bodies(), vec![vec!["cmd1", "cmd2", "cmd3"]]);

        let stats = registry.disconnect(handle).unwrap();
        assert_eq!(stats.flushes, 2);
        assert_eq!(sink.bodies()[1], vec!["cmd4"]);
        assert!(!registry.contains(handle));
    }

    #[test]
    fn test_sessions_are_independent() {
        let (registry, sink) = registry();
        let a = registry.connect(2).unwrap();
        let b = registry.connect(2).unwrap();

        registry.receive(a, b"a1\n");
        registry.receive(b, b"b1\n");
        registry.receive(a, b"a2\n");

        assert_eq!(sink.bodies(), vec![vec!["a1", "a2"]]);
        registry.disconnect(b);
        assert_eq!(sink.bodies()[1], vec!["b1"]);
    }

    #[test]
    fn test_partial_chunks_across_receives() {
        let (registry, sink) = registry();
        let handle = registry.connect(2).unwrap();

        registry.receive(handle, b"cm");
        registry.receive(handle, b"d1\ncmd");
        registry.receive(handle, b"2\n");

        assert_eq!(sink.bodies(), vec![vec!["cmd1", "cmd2"]]);
    }

    #[test]
    fn test_unknown_handle_and_empty_payload_ignored() {
        let (registry, sink) = registry();
        let handle = registry.connect(1).unwrap();

        registry.receive(Handle::from(999), b"x\n");
        registry.receive(handle, b"");
        assert!(registry.disconnect(Handle::from(999)).is_none());

        assert_eq!(sink.count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handle_invalid_after_disconnect() {
        let (registry, sink) = registry();
        let handle = registry.connect(1).unwrap();
        registry.disconnect(handle);

        registry.receive(handle, b"x\n");
        assert_eq!(sink.count(), 0);
        assert!(registry.disconnect(handle).is_none());
    }

    #[test]
    fn test_zero_bulk_size_flushes_every_command() {
        let (registry, sink) = registry();
        let handle = registry.connect(0).unwrap();
        registry.receive(handle, b"a\nb\n");
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn test_shutdown_disconnects_all() {
        let (registry, sink) = registry();
        let a = registry.connect(5).unwrap();
        let b = registry.connect(5).unwrap();
        registry.receive(a, b"a\n");
        registry.receive(b, b"b\n");

        registry.shutdown().unwrap();

        assert!(registry.is_empty());
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn test_connect_refused_after_shutdown() {
        let (registry, sink) = registry();
        let handle = registry.connect(1).unwrap();
        registry.shutdown().unwrap();
        assert!(registry.is_shut_down());

        let err = registry.connect(1).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        registry.receive(handle, b"lost\n");
        assert_eq!(sink.count(), 0);
        assert!(registry.is_empty());
        assert!(registry.shutdown().is_ok());
    }

    #[test]
    fn test_concurrent_sessions() {
        let (registry, sink) = registry();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let handle = registry.connect(4).unwrap();
                    for i in 0..40 {
                        registry.receive(handle, format!("cmd{i}\n").as_bytes());
                    }
                    registry.disconnect(handle);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
        assert_eq!(sink.count(), 8 * 10);
    }

    #[test]
    fn test_from_config_writes_files() {
        let dir = TempDir::new().unwrap();
        let config = BulkConfig {
            console: false,
            output_dir: dir.path().to_path_buf(),
            ..BulkConfig::with_bulk_size(2)
        };
        let registry = Registry::from_config(&config).unwrap();

        let handle = registry.connect(2).unwrap();
        registry.receive(handle, b"a\nb\nc\n");
        registry.disconnect(handle);
        registry.shutdown().unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = BulkConfig::with_bulk_size(0);
        assert!(Registry::from_config(&config).is_err());
    }
}
