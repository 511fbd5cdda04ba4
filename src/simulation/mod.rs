//! Simulation interpreters
//!
//! Stand-ins for transition selectors. While one is installed the
//! interpreter asks it for each transition value instead of calling handler
//! code, and no state handlers run.
//!
//! - `ScriptInterpreter`: replays `state { 'value' ... }` blocks
//! - `RandomInterpreter`: picks legal values at random, seedable
//! - `VerifyInterpreter`: strict `state value` replay that checks visit order

mod random;
mod script;
mod verify;

pub use random::{RandomInterpreter, DEFAULT_FAILURE_PROBABILITY};
pub use script::ScriptInterpreter;
pub use verify::VerifyInterpreter;

use thiserror::Error;

use crate::parser::ParseError;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("script has no entry for state '{state}'")]
    UnknownState { state: String },

    #[error("script entry for state '{state}' has no values")]
    NoValues { state: String },

    #[error("verification step {position}: expected state '{expected}', visited '{actual}'")]
    Mismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("verification script exhausted at state '{state}'")]
    Exhausted { state: String },

    #[error("failure probability {0} is outside 0.0..=1.0")]
    InvalidProbability(f64),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Supplies transition values in place of selectors.
pub trait TransitionSource: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Rewind to the beginning
    fn reset(&mut self);

    /// Value for the selector `method` of `state`
    fn next_value(&mut self, state: &str, method: &str) -> Result<String, SimulationError>;
}

impl<T: TransitionSource + ?Sized> TransitionSource for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn next_value(&mut self, state: &str, method: &str) -> Result<String, SimulationError> {
        (**self).next_value(state, method)
    }
}
