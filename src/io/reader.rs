//! Line readers feeding the batching state machine.
//!
//! A [`Reader`] decouples the parser from the transport:
//!
//! - [`BlockingReader`]: a finite, fully available source (memory or a
//!   command file). Never reports [`ReadState::Wait`].
//! - [`StreamReader`]: a blocking stream such as stdin, read line by line
//!   as data arrives. Never reports [`ReadState::Wait`].
//! - [`YieldReader`]: a source fed incrementally with [`YieldReader::push`].
//!   Reports [`ReadState::Wait`] until a complete line is buffered.
//!
//! All of them split on `\n`, strip one trailing `\r`, and decode lossily
//! as UTF-8.

use crate::error::Result;
use crate::io::file::InputBytes;
use std::io::BufRead;
use std::path::Path;
use tracing::warn;

/// Result of a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadState {
    /// A complete line is available.
    Ready(String),
    /// No complete line yet; the source is still live.
    Wait,
    /// The source is exhausted.
    Done,
}

/// Source of command lines for a batching context.
pub trait Reader: Send {
    /// Reads the next line.
    fn read(&mut self) -> ReadState;

    /// Marks the source as finished.
    ///
    /// Subsequent reads drain whatever the reader still considers part of
    /// the stream, then return [`ReadState::Done`].
    fn close(&mut self);

    /// Returns whether this reader can report [`ReadState::Wait`].
    fn is_yielding(&self) -> bool {
        false
    }
}

/// Reader over a bounded, already available source.
///
/// # Examples
///
/// ```
/// use bulkmt::io::{BlockingReader, ReadState, Reader};
///
/// let mut reader = BlockingReader::from_text("cmd1\ncmd2");
/// assert_eq!(reader.read(), ReadState::Ready("cmd1".to_string()));
/// assert_eq!(reader.read(), ReadState::Ready("cmd2".to_string()));
/// assert_eq!(reader.read(), ReadState::Done);
/// ```
#[derive(Debug, Default)]
pub struct BlockingReader {
    data: InputBytes,
    pos: usize,
}

impl BlockingReader {
    /// Creates a reader over raw bytes.
    #[must_use]
    pub const fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: InputBytes::Owned(data),
            pos: 0,
        }
    }

    /// Creates a reader over text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Creates a reader over a command file. Large files are scanned
    /// through a memory mapping without being copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            data: InputBytes::open(path)?,
            pos: 0,
        })
    }
}

impl Reader for BlockingReader {
    fn read(&mut self) -> ReadState {
        if self.pos >= self.data.len() {
            return ReadState::Done;
        }

        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                let line = decode_line(&rest[..idx]);
                self.pos += idx + 1;
                ReadState::Ready(line)
            }
            None => {
                let line = decode_line(rest);
                self.pos = self.data.len();
                ReadState::Ready(line)
            }
        }
    }

    fn close(&mut self) {
        self.pos = self.data.len();
    }
}

/// Reader pulling lines from a blocking stream as they arrive.
///
/// Each [`read`](Reader::read) blocks until one full line (or end of
/// stream) is available, so commands are batched and timestamped while
/// the stream is still open. A read error ends the stream.
///
/// # Examples
///
/// ```
/// use bulkmt::io::{ReadState, Reader, StreamReader};
///
/// let mut reader = StreamReader::new(&b"cmd1\r\ncmd2\n"[..]);
/// assert_eq!(reader.read(), ReadState::Ready("cmd1".to_string()));
/// assert_eq!(reader.read(), ReadState::Ready("cmd2".to_string()));
/// assert_eq!(reader.read(), ReadState::Done);
/// ```
#[derive(Debug)]
pub struct StreamReader<S> {
    stream: S,
    line: Vec<u8>,
    done: bool,
}

impl<S: BufRead + Send> StreamReader<S> {
    /// Wraps a buffered stream.
    pub const fn new(stream: S) -> Self {
        Self {
            stream,
            line: Vec::new(),
            done: false,
        }
    }
}

impl<S: BufRead + Send> Reader for StreamReader<S> {
    fn read(&mut self) -> ReadState {
        if self.done {
            return ReadState::Done;
        }

        self.line.clear();
        match self.stream.read_until(b'\n', &mut self.line) {
            Ok(0) => {
                self.done = true;
                ReadState::Done
            }
            Ok(_) => {
                let bytes = self.line.strip_suffix(b"\n").unwrap_or(&self.line);
                ReadState::Ready(decode_line(bytes))
            }
            Err(e) => {
                warn!(error = %e, "input stream failed, treating as end of input");
                self.done = true;
                ReadState::Done
            }
        }
    }

    fn close(&mut self) {
        self.done = true;
    }
}

/// Reader over a source that is fed from outside in arbitrary chunks.
///
/// Bytes that do not yet end in `\n` stay buffered and are prefixed to the
/// next line once its delimiter arrives. Consumed lines are skipped with a
/// cursor and compacted away on the next push, and an unterminated tail is
/// never rescanned, so feeding input costs time linear in its size.
///
/// # Examples
///
/// ```
/// use bulkmt::io::{ReadState, Reader, YieldReader};
///
/// let mut reader = YieldReader::new();
/// reader.push(b"cm");
/// assert_eq!(reader.read(), ReadState::Wait);
/// reader.push(b"d1\n");
/// assert_eq!(reader.read(), ReadState::Ready("cmd1".to_string()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct YieldReader {
    pending: Vec<u8>,
    /// Start of the first unread line in `pending`.
    start: usize,
    /// `pending[start..scanned]` is known to hold no `\n`.
    scanned: usize,
    closed: bool,
}

impl YieldReader {
    /// Creates an empty, live reader.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            start: 0,
            scanned: 0,
            closed: false,
        }
    }

    /// Appends a chunk of raw bytes. Ignored once the reader is closed.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.closed {
            return;
        }
        if self.start > 0 {
            self.pending.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.pending.extend_from_slice(bytes);
    }

    /// Returns the number of buffered, not yet consumed bytes.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len() - self.start
    }

    /// Returns whether the reader has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Reader for YieldReader {
    fn read(&mut self) -> ReadState {
        let from = self.scanned.max(self.start);
        if let Some(offset) = self.pending[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            let line = decode_line(&self.pending[self.start..end]);
            self.start = end + 1;
            self.scanned = self.start;
            return ReadState::Ready(line);
        }
        self.scanned = self.pending.len();

        if !self.closed {
            return ReadState::Wait;
        }

        if self.start == self.pending.len() {
            ReadState::Done
        } else {
            // unterminated tail of a closed stream is its last line
            let line = decode_line(&self.pending[self.start..]);
            self.pending.clear();
            self.start = 0;
            self.scanned = 0;
            ReadState::Ready(line)
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_yielding(&self) -> bool {
        true
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
