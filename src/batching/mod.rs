//! Bulk command batching.
//!
//! This module contains the batching state machine and the contexts that
//! run it:
//!
//! - **State**: static (fixed-size) and dynamic (brace-delimited) batching
//! - **Context**: per-session reader, state and batch, root or slave
//! - **Shared**: the master context many slaves forward into

pub mod context;
pub mod shared;
pub mod state;

pub use context::{Context, ContextStats, Outcome};
pub use shared::{SharedContext, SharedStats};
pub use state::{Action, CLOSE_BRACE, OPEN_BRACE, State};
