//! Command representation for bulkmt.
//!
//! A command is one line of input accepted by a batching context. Commands
//! are immutable once created and serialize to their raw body.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between commands when a batch is serialized.
pub const BATCH_SEPARATOR: &str = ",";

/// An ordered group of commands accumulated between flushes.
pub type Batch = Vec<Command>;

/// A single parsed command.
///
/// # Examples
///
/// ```
/// use bulkmt::core::Command;
///
/// let cmd = Command::new("cmd1");
/// assert_eq!(cmd.serialize(), "cmd1");
/// assert!(cmd.created_at() > 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Raw command text.
    body: String,

    /// Unix timestamp (seconds) when the command was accepted.
    created_at: i64,
}

impl Command {
    /// Creates a command stamped with the current time.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self::with_timestamp(body, current_timestamp())
    }

    /// Creates a command with an explicit creation timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use bulkmt::core::Command;
    ///
    /// let cmd = Command::with_timestamp("cmd1", 1_700_000_000);
    /// assert_eq!(cmd.created_at(), 1_700_000_000);
    /// ```
    #[must_use]
    pub fn with_timestamp(body: impl Into<String>, created_at: i64) -> Self {
        Self {
            body: body.into(),
            created_at,
        }
    }

    /// Returns the command body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the creation timestamp in seconds since the Unix epoch.
    #[must_use]
    pub const fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Serializes the command. This is exactly the raw body.
    #[must_use]
    pub fn serialize(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

/// Serializes a batch as its commands joined by [`BATCH_SEPARATOR`].
///
/// # Examples
///
/// ```
/// use bulkmt::core::{Command, serialize_batch};
///
/// let batch = vec![Command::new("a"), Command::new("b")];
/// assert_eq!(serialize_batch(&batch), "a,b");
/// ```
#[must_use]
pub fn serialize_batch(batch: &[Command]) -> String {
    batch
        .iter()
        .map(Command::serialize)
        .collect::<Vec<_>>()
        .join(BATCH_SEPARATOR)
}

/// Returns the current Unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
