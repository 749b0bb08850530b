//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::config::{
    BulkConfig, DEFAULT_BIND, DEFAULT_BULK_SIZE, DEFAULT_FILE_WORKERS, TruncationPolicy,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bulkmt: bulk command batching.
///
/// Reads commands one per line and writes them out in batches of N to the
/// console and to `bulk*.log` files. A `{` line opens a group that is
/// written as one batch when the matching `}` arrives.
#[derive(Parser, Debug)]
#[command(name = "bulkmt")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print a summary after the command finishes.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for the summary (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Batch commands from a file or stdin.
    Run {
        /// Input file (reads stdin if omitted).
        file: Option<PathBuf>,

        /// Batching options.
        #[command(flatten)]
        bulk: BulkArgs,
    },

    /// Accept commands from many TCP clients into one shared batch.
    ///
    /// Runs until interrupted with Ctrl-C.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "BULKMT_BIND", default_value = DEFAULT_BIND)]
        bind: String,

        /// Batching options.
        #[command(flatten)]
        bulk: BulkArgs,
    },
}

/// Batching and logger options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct BulkArgs {
    /// Number of commands per static batch.
    #[arg(short = 'n', long, env = "BULKMT_BULK_SIZE", default_value_t = DEFAULT_BULK_SIZE)]
    pub bulk: usize,

    /// Number of file logger workers.
    #[arg(short, long, env = "BULKMT_WORKERS", default_value_t = DEFAULT_FILE_WORKERS)]
    pub workers: usize,

    /// Directory for `bulk*.log` files.
    #[arg(short, long, env = "BULKMT_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Write batches on the calling thread instead of worker threads.
    #[arg(long)]
    pub sync: bool,

    /// Do not write batches to stdout.
    #[arg(long)]
    pub no_console: bool,

    /// Do not write batch files.
    #[arg(long)]
    pub no_file: bool,

    /// What to do with an unterminated `{` group at end of input.
    #[arg(long, value_enum, default_value_t = TruncationPolicy::Discard)]
    pub on_truncate: TruncationPolicy,
}

impl BulkArgs {
    /// Builds the batching configuration described by these options.
    #[must_use]
    pub fn to_config(&self) -> BulkConfig {
        BulkConfig {
            bulk_size: self.bulk,
            workers: self.workers,
            output_dir: self.output_dir.clone(),
            console: !self.no_console,
            file: !self.no_file,
            asynchronous: !self.sync,
            on_truncate: self.on_truncate,
        }
    }
}
