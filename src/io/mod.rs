//! I/O utilities for bulkmt.
//!
//! Provides the line readers that feed batching contexts, along with file
//! helpers used for command input and batch log output.

pub mod file;
pub mod reader;

pub use file::{InputBytes, MMAP_THRESHOLD, write_file};
pub use reader::{BlockingReader, ReadState, Reader, StreamReader, YieldReader};
