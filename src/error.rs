//! Error types for bulkmt operations.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! batching, logging, server and configuration operations.
//!
//! Note that logger failures during a flush never reach the batching state
//! machine: they are reported through `tracing` at the fan-out boundary.

use thiserror::Error;

/// Result type alias for bulkmt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (file and stream operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Logger errors (sink failures, worker pool lifecycle).
    #[error("logger error: {0}")]
    Logger(#[from] LoggerError),

    /// Aggregation server errors.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// Operation not allowed in the current lifecycle state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// Logger-specific errors.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// The logger has been shut down and no longer accepts batches.
    #[error("logger {name} is closed")]
    Closed {
        /// Logger name.
        name: String,
    },

    /// A background worker thread could not be started.
    #[error("failed to spawn worker for logger {name}: {reason}")]
    WorkerSpawn {
        /// Logger name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// A background worker thread panicked.
    #[error("worker for logger {name} panicked")]
    WorkerPanicked {
        /// Logger name.
        name: String,
    },

    /// Writing a batch to the console failed.
    #[error("console write failed: {0}")]
    Console(String),
}

/// Aggregation server errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind the listening socket.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// Address that could not be bound.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to build or drive the async runtime.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}
