//! CLI layer for bulkmt.
//!
//! Provides the command-line interface using clap: `run` batches a file or
//! stdin, `serve` aggregates commands from many TCP clients.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{BulkArgs, Cli, Commands};
