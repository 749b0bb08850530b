//! Batching context.
//!
//! A [`Context`] owns its reader, its current [`State`] and the batch being
//! accumulated. It drives the state machine by pulling lines from the reader
//! until the reader reports [`ReadState::Wait`] (the context suspends and can
//! be resumed later) or [`ReadState::Done`] (the context finishes).
//!
//! A context is either a root, flushing to its own [`LoggerSet`], or a slave
//! forwarding into a [`SharedContext`].

use crate::batching::shared::SharedContext;
use crate::batching::state::{Action, CLOSE_BRACE, State};
use crate::config::TruncationPolicy;
use crate::core::{Batch, Command};
use crate::io::{ReadState, Reader, YieldReader};
use crate::logger::LoggerSet;
use serde::Serialize;
use std::mem;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why [`Context::process`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The reader has no complete line yet; call again after feeding it.
    Suspended,
    /// The reader is exhausted and the context has finished.
    Finished,
}

/// Counters describing a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    /// Commands accepted (brace lines excluded).
    pub commands: u64,
    /// Batches this context handed to loggers.
    pub flushes: u64,
    /// Commands forwarded to a master context.
    pub forwarded: u64,
    /// Commands dropped from an unterminated brace group.
    pub discarded: u64,
}

/// Where a context delivers its commands.
#[derive(Debug)]
enum Sink {
    /// Root context flushing to its own loggers.
    Loggers(LoggerSet),
    /// Slave context forwarding into a master.
    Master(Arc<SharedContext>),
}

/// Stateful unit running the batching state machine for one session.
///
/// # Examples
///
/// ```
/// use bulkmt::batching::{Context, Outcome};
/// use bulkmt::io::BlockingReader;
/// use bulkmt::logger::LoggerSet;
///
/// let reader = BlockingReader::from_text("cmd1\ncmd2\ncmd3\n");
/// let mut context = Context::root(reader, 2, LoggerSet::new());
/// assert_eq!(context.process(), Outcome::Finished);
/// assert_eq!(context.stats().flushes, 2);
/// ```
#[derive(Debug)]
pub struct Context<R: Reader> {
    reader: R,
    state: State,
    batch: Batch,
    bulk_size: usize,
    sink: Sink,
    on_truncate: TruncationPolicy,
    finished: bool,
    stats: ContextStats,
}

impl<R: Reader> Context<R> {
    /// Creates a root context flushing every `bulk_size` commands
    /// (a size of 0 is treated as 1).
    #[must_use]
    pub fn root(reader: R, bulk_size: usize, loggers: LoggerSet) -> Self {
        Self::with_sink(reader, bulk_size, Sink::Loggers(loggers))
    }

    /// Creates a slave context forwarding static commands into `master`.
    #[must_use]
    pub fn slave(reader: R, master: Arc<SharedContext>) -> Self {
        let bulk_size = master.bulk_size();
        Self::with_sink(reader, bulk_size, Sink::Master(master))
    }

    fn with_sink(reader: R, bulk_size: usize, sink: Sink) -> Self {
        Self {
            reader,
            state: State::default(),
            batch: Vec::new(),
            bulk_size: bulk_size.max(1),
            sink,
            on_truncate: TruncationPolicy::default(),
            finished: false,
            stats: ContextStats::default(),
        }
    }

    /// Sets how an unterminated brace group is handled on termination.
    #[must_use]
    pub const fn with_truncation_policy(mut self, policy: TruncationPolicy) -> Self {
        self.on_truncate = policy;
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Returns the commands accumulated since the last flush.
    #[must_use]
    pub fn pending(&self) -> &[Command] {
        &self.batch
    }

    /// Returns the bulk size.
    #[must_use]
    pub const fn bulk_size(&self) -> usize {
        self.bulk_size
    }

    /// Returns the current counters.
    #[must_use]
    pub const fn stats(&self) -> ContextStats {
        self.stats
    }

    /// Returns whether the context has finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns whether this context forwards into a master.
    #[must_use]
    pub const fn is_slave(&self) -> bool {
        matches!(self.sink, Sink::Master(_))
    }

    /// Gives mutable access to the reader, e.g. to push more input.
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Drives the state machine until the reader waits or is exhausted.
    pub fn process(&mut self) -> Outcome {
        if self.finished {
            return Outcome::Finished;
        }

        loop {
            match self.reader.read() {
                ReadState::Ready(line) => self.consume(line),
                ReadState::Wait => return Outcome::Suspended,
                ReadState::Done => {
                    self.finish();
                    return Outcome::Finished;
                }
            }
        }
    }

    /// Closes the reader and runs the state machine to completion.
    ///
    /// Pending static commands are flushed; an unterminated brace group
    /// is handled according to the truncation policy.
    pub fn terminate(&mut self) {
        self.reader.close();
        self.process();
    }

    fn consume(&mut self, line: String) {
        match self.state.advance(&line) {
            Action::Append => self.append(line),
            Action::OpenGroup => {
                // residual static content is flushed before the group starts
                self.flush();
            }
            Action::Nest => {}
            Action::CloseGroup => self.flush(),
        }
    }

    fn append(&mut self, line: String) {
        if !self.state.is_dynamic() && line == CLOSE_BRACE {
            warn!(depth = self.state.depth(), "unmatched closing brace passed through");
        }

        let command = Command::new(line);
        self.stats.commands += 1;

        if self.state.is_dynamic() {
            self.batch.push(command);
            return;
        }

        if let Sink::Master(master) = &self.sink {
            master.push(command);
            self.stats.forwarded += 1;
            return;
        }

        self.batch.push(command);
        if self.batch.len() >= self.bulk_size {
            self.flush();
        }
    }

    fn finish(&mut self) {
        if self.state.is_dynamic() && !self.batch.is_empty() {
            match self.on_truncate {
                TruncationPolicy::Discard => {
                    let dropped = self.batch.len();
                    self.batch.clear();
                    self.stats.discarded += dropped as u64;
                    warn!(
                        depth = self.state.depth(),
                        dropped, "unterminated brace group discarded"
                    );
                }
                TruncationPolicy::Flush => {
                    warn!(
                        depth = self.state.depth(),
                        commands = self.batch.len(),
                        "unterminated brace group flushed"
                    );
                    self.flush();
                }
            }
        } else {
            self.flush();
        }
        self.finished = true;
    }

    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch = mem::take(&mut self.batch);
        self.stats.flushes += 1;
        debug!(commands = batch.len(), slave = self.is_slave(), "batch flushed");
        match &self.sink {
            Sink::Loggers(loggers) => {
                loggers.dispatch(&batch);
            }
            Sink::Master(master) => master.dispatch_group(&batch),
        }
    }
}

impl Context<YieldReader> {
    /// Feeds a chunk of raw bytes and processes every complete line.
    ///
    /// Empty chunks and chunks received after the context finished are
    /// ignored.
    pub fn receive(&mut self, bytes: &[u8]) -> Outcome {
        if self.finished {
            return Outcome::Finished;
        }
        if !bytes.is_empty() {
            self.reader.push(bytes);
        }
        self.process()
    }
}

impl<R: Reader> Drop for Context<R> {
    fn drop(&mut self) {
        if !self.finished {
            self.terminate();
        }
    }
}
