//! Batching state machine.
//!
//! A context is either in [`State::Static`], where commands accumulate up
//! to the bulk size, or in [`State::Dynamic`], inside a brace-delimited
//! group. The state only tracks the brace depth; the batch itself lives in
//! the owning context, which applies the returned [`Action`].

use serde::Serialize;

/// Line that opens a brace group.
pub const OPEN_BRACE: &str = "{";

/// Line that closes a brace group.
pub const CLOSE_BRACE: &str = "}";

/// Current batching state of a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum State {
    /// Fixed-size batching. This is the initial state.
    #[default]
    Static,
    /// Inside a brace group of the given nesting depth (always >= 1).
    Dynamic {
        /// Number of currently open braces.
        depth: usize,
    },
}

/// What the context must do with the line just consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Append the line as a command to the current batch.
    Append,
    /// Flush any residual static batch; a group has just opened.
    OpenGroup,
    /// A nested brace changed the depth; nothing to append.
    Nest,
    /// The outermost group closed; flush the group batch.
    CloseGroup,
}

impl State {
    /// Advances the state for one input line and returns the action the
    /// context has to perform.
    ///
    /// # Examples
    ///
    /// ```
    /// use bulkmt::batching::{Action, State};
    ///
    /// let mut state = State::Static;
    /// assert_eq!(state.advance("{"), Action::OpenGroup);
    /// assert_eq!(state.advance("cmd"), Action::Append);
    /// assert_eq!(state.advance("}"), Action::CloseGroup);
    /// assert_eq!(state, State::Static);
    /// ```
    pub fn advance(&mut self, line: &str) -> Action {
        match self {
            Self::Static => {
                if line == OPEN_BRACE {
                    *self = Self::Dynamic { depth: 1 };
                    Action::OpenGroup
                } else {
                    Action::Append
                }
            }
            Self::Dynamic { depth } => match line {
                OPEN_BRACE => {
                    *depth += 1;
                    Action::Nest
                }
                CLOSE_BRACE => {
                    *depth -= 1;
                    if *depth == 0 {
                        *self = Self::Static;
                        Action::CloseGroup
                    } else {
                        Action::Nest
                    }
                }
                _ => Action::Append,
            },
        }
    }

    /// Returns whether the state is inside a brace group.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    /// Returns the current brace depth (0 in static state).
    #[must_use]
    pub const fn depth(&self) -> usize {
        match self {
            Self::Static => 0,
            Self::Dynamic { depth } => *depth,
        }
    }
}
