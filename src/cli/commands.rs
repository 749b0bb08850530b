//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::batching::{Context, ContextStats};
use crate::cli::output::{OutputFormat, format_run_summary, format_server_summary};
use crate::cli::parser::{BulkArgs, Cli, Commands};
use crate::config::{BulkConfig, ServerConfig};
use crate::error::Result;
use crate::io::{BlockingReader, Reader, StreamReader};
use crate::logger::{AsyncLoggerStats, LoggerPool};
use crate::server::{self, Server};
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success. The string is empty unless
/// `--verbose` was given; batches themselves go straight to the loggers.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run { file, bulk } => cmd_run(file.as_deref(), bulk, cli.verbose, format),
        Commands::Serve { bind, bulk } => cmd_serve(bind, bulk, cli.verbose, format),
    }
}

fn cmd_run(
    file: Option<&Path>,
    args: &BulkArgs,
    verbose: bool,
    format: OutputFormat,
) -> Result<String> {
    let config = args.to_config();
    config.validate()?;

    let (stats, loggers) = match file {
        Some(path) => run_batches(BlockingReader::from_path(path)?, &config)?,
        None => run_batches(StreamReader::new(BufReader::new(io::stdin())), &config)?,
    };

    info!(
        commands = stats.commands,
        flushes = stats.flushes,
        "input processed"
    );

    if verbose {
        Ok(format_run_summary(&stats, &loggers, format))
    } else {
        Ok(String::new())
    }
}

fn cmd_serve(bind: &str, args: &BulkArgs, verbose: bool, format: OutputFormat) -> Result<String> {
    let config = ServerConfig::new(bind, args.to_config())?;
    config.validate()?;
    if !config.bulk.asynchronous {
        warn!("synchronous loggers block connection tasks while writing");
    }

    let pool = LoggerPool::from_config(&config.bulk)?;
    let runtime = server::runtime()?;
    let stats = runtime.block_on(serve_until_interrupted(&config, &pool))?;
    pool.shutdown()?;

    if verbose {
        Ok(format_server_summary(&stats, &pool.stats(), format))
    } else {
        Ok(String::new())
    }
}

async fn serve_until_interrupted(
    config: &ServerConfig,
    pool: &LoggerPool,
) -> Result<server::ServerStats> {
    let server = Server::bind(config, pool.set()).await?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C, stopping");
            } else {
                info!("interrupt received, shutting down");
            }
        })
        .await
}

/// Batches everything `reader` yields through the loggers described by
/// `config`, then drains them.
fn run_batches<R: Reader>(
    reader: R,
    config: &BulkConfig,
) -> Result<(ContextStats, Vec<AsyncLoggerStats>)> {
    config.validate()?;
    let pool = LoggerPool::from_config(config)?;
    let stats = {
        let mut context = Context::root(reader, config.bulk_size, pool.set())
            .with_truncation_policy(config.on_truncate);
        context.process();
        context.stats()
    };
    pool.shutdown()?;
    Ok((stats, pool.stats()))
}
