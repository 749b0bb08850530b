//! # bulkmt
//!
//! Bulk command batching.
//!
//! Commands arrive one per line and are grouped into batches. A batch is
//! written to every subscribed logger as one comma-joined line, both on the
//! console and as its own `bulk*.log` file.
//!
//! ## Features
//!
//! - **Static batching**: a batch is flushed every N commands
//! - **Dynamic batching**: `{` ... `}` groups are flushed whole, nesting allowed
//! - **Asynchronous loggers**: console and file writers on worker threads
//! - **Session registry**: handle-based API for feeding bytes in arbitrary chunks
//! - **Aggregation server**: many TCP clients share one master batch

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod batching;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod logger;
pub mod registry;
pub mod server;
mod sync;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use crate::core::{Batch, Command, serialize_batch};

// Re-export batching types
pub use batching::{Context, ContextStats, Outcome, SharedContext, State};

// Re-export configuration
pub use config::{BulkConfig, ServerConfig, TruncationPolicy};

// Re-export I/O types
pub use io::{BlockingReader, ReadState, Reader, StreamReader, YieldReader};

// Re-export logger types
pub use logger::{AsyncLogger, ConsoleLogger, FileLogger, Logger, LoggerPool, LoggerSet};

// Re-export session and server types
pub use registry::{Handle, Registry};
pub use server::{Server, ServerStats};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
