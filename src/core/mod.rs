//! Core domain models for bulkmt.
//!
//! Commands and batches are pure value types with no I/O dependencies.

pub mod command;

pub use command::{BATCH_SEPARATOR, Batch, Command, serialize_batch};
