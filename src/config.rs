//! Runtime configuration for batching sessions and the aggregation server.
//!
//! Values are usually populated from CLI flags (with environment variable
//! fallbacks, see [`crate::cli::parser`]) and checked with `validate`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default static batch size.
pub const DEFAULT_BULK_SIZE: usize = 3;

/// Default number of asynchronous file logger workers.
pub const DEFAULT_FILE_WORKERS: usize = 2;

/// Number of asynchronous console logger workers.
///
/// One worker keeps console lines in flush order.
pub const CONSOLE_WORKERS: usize = 1;

/// Default aggregation server bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:9000";

/// What to do with a pending brace group when its session terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Drop the incomplete group and report it.
    #[default]
    Discard,
    /// Flush the incomplete group as a regular batch.
    Flush,
}

/// Batching and logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Maximum number of commands in a static batch.
    pub bulk_size: usize,

    /// Number of asynchronous file logger workers.
    pub workers: usize,

    /// Directory receiving `bulk*.log` files.
    pub output_dir: PathBuf,

    /// Whether batches are written to stdout.
    pub console: bool,

    /// Whether batches are written to files.
    pub file: bool,

    /// Whether loggers run on background workers.
    pub asynchronous: bool,

    /// Handling of an unterminated brace group on termination.
    pub on_truncate: TruncationPolicy,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            bulk_size: DEFAULT_BULK_SIZE,
            workers: DEFAULT_FILE_WORKERS,
            output_dir: PathBuf::from("."),
            console: true,
            file: true,
            asynchronous: true,
            on_truncate: TruncationPolicy::default(),
        }
    }
}

impl BulkConfig {
    /// Creates a configuration with the given bulk size and defaults otherwise.
    #[must_use]
    pub fn with_bulk_size(bulk_size: usize) -> Self {
        Self {
            bulk_size,
            ..Self::default()
        }
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the bulk size or worker count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.bulk_size == 0 {
            return Err(Error::Config {
                message: "bulk size must be > 0".to_string(),
            });
        }
        if self.asynchronous && self.workers == 0 {
            return Err(Error::Config {
                message: "worker count must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Aggregation server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,

    /// Batching applied by the shared master context.
    pub bulk: BulkConfig,
}

impl ServerConfig {
    /// Parses a bind address and pairs it with a batching configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address does not parse.
    pub fn new(bind: &str, bulk: BulkConfig) -> Result<Self> {
        let bind = bind.parse().map_err(|e| Error::Config {
            message: format!("invalid bind address {bind}: {e}"),
        })?;
        Ok(Self { bind, bulk })
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the batching configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.bulk.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BulkConfig::default();
        assert_eq!(config.bulk_size, DEFAULT_BULK_SIZE);
        assert_eq!(config.on_truncate, TruncationPolicy::Discard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_bulk_size_rejected() {
        let config = BulkConfig::with_bulk_size(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bulk size"));
    }

    #[test]
    fn test_zero_workers_rejected_only_when_async() {
        let mut config = BulkConfig {
            workers: 0,
            ..BulkConfig::default()
        };
        assert!(config.validate().is_err());

        config.asynchronous = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_parses_bind() {
        let config = ServerConfig::new(DEFAULT_BIND, BulkConfig::default()).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_rejects_bad_bind() {
        let result = ServerConfig::new("not-an-address", BulkConfig::default());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_truncation_policy_serde() {
        let json = serde_json::to_string(&TruncationPolicy::Flush).unwrap();
        assert_eq!(json, "\"flush\"");
    }
}
