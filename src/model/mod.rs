//! In-memory model of a compiled state table
//!
//! - `Transition`: one edge, identified by its declaration line
//! - `TransitionBlock`: all edges leaving a state
//! - `StateMachine`: the ordered set of blocks

pub mod block;
pub mod machine;
pub mod transition;

pub use block::TransitionBlock;
pub use machine::StateMachine;
pub use transition::{Transition, TransitionId};

use thiserror::Error;

/* ===================== Reserved Names ===================== */

pub const START_STATE: &str = "start";
pub const FINISH_STATE: &str = "finish";
pub const FAILURE_STATE: &str = "failure";
pub const TERMINATE_STATE: &str = "terminate";

/// Matches any value without an exact match, except `!`
pub const WILDCARD: &str = "*";
/// The implicit error route
pub const ERROR_VALUE: &str = "!";
/// Value used to force a transition to `terminate`
pub const TERMINATE_REQUESTED: &str = "terminateRequested";

pub const DEFAULT_TRANSITION_METHOD: &str = "emptyTransition";
pub const DEFAULT_TIMER: &str = "system";
pub const USER_TIMER: &str = "user";
pub const START_DELAY_TIMER: &str = "start_delay";

/// States with built-in handler defaults
pub const BUILTIN_STATES: &[&str] = &[FINISH_STATE, FAILURE_STATE, TERMINATE_STATE];

pub fn is_builtin_state(state: &str) -> bool {
    BUILTIN_STATES.contains(&state)
}

/* ===================== Errors ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("no transition block for state '{state}'")]
    MissingBlock { state: String },

    #[error("state table has no blocks, so there is no start state")]
    NoStartState,

    #[error("state '{state}' already declared on line {first_line}")]
    DuplicateBlock { state: String, first_line: usize },

    #[error("value '{value}' already declared for state '{state}' on line {first_line}")]
    DuplicateValue {
        state: String,
        value: String,
        first_line: usize,
    },
}
