//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::batching::ContextStats;
use crate::error::Error;
use crate::logger::AsyncLoggerStats;
use crate::server::ServerStats;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats the summary of a `run` command.
#[must_use]
pub fn format_run_summary(
    stats: &ContextStats,
    loggers: &[AsyncLoggerStats],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("Run summary\n");
            output.push_str("===========\n\n");
            let _ = writeln!(output, "  Commands:   {}", stats.commands);
            let _ = writeln!(output, "  Batches:    {}", stats.flushes);
            if stats.discarded > 0 {
                let _ = writeln!(output, "  Discarded:  {}", stats.discarded);
            }
            write_logger_lines(&mut output, loggers);
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct RunSummary<'a> {
                context: &'a ContextStats,
                loggers: &'a [AsyncLoggerStats],
            }
            format_json(&RunSummary {
                context: stats,
                loggers,
            })
        }
    }
}

/// Formats the summary printed when the server stops.
#[must_use]
pub fn format_server_summary(
    stats: &ServerStats,
    loggers: &[AsyncLoggerStats],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("Server summary\n");
            output.push_str("==============\n\n");
            let _ = writeln!(output, "  Connections: {}", stats.connections);
            let _ = writeln!(output, "  Commands:    {}", stats.master.received);
            let _ = writeln!(output, "  Batches:     {}", stats.master.flushes);
            let _ = writeln!(output, "  Groups:      {}", stats.master.groups);
            write_logger_lines(&mut output, loggers);
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ServerSummary<'a> {
                server: &'a ServerStats,
                loggers: &'a [AsyncLoggerStats],
            }
            format_json(&ServerSummary {
                server: stats,
                loggers,
            })
        }
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }
            format_json(&ErrorOutput {
                error: error.to_string(),
            })
        }
    }
}

fn write_logger_lines(output: &mut String, loggers: &[AsyncLoggerStats]) {
    if loggers.is_empty() {
        return;
    }
    output.push_str("\nLoggers:\n");
    let _ = writeln!(
        output,
        "  {:<10} {:>8} {:>8} {:>8}",
        "Name", "Written", "Failed", "Queued"
    );
    for logger in loggers {
        let _ = writeln!(
            output,
            "  {:<10} {:>8} {:>8} {:>8}",
            logger.name, logger.written, logger.failed, logger.queued
        );
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
