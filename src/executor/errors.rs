//! Error types for the stepwise interpreter
//!
//! `StepError` is always recovered inside a step by routing to `failure`.
//! `InterpreterError` is fatal and surfaces to the scheduler as SystemError.

use thiserror::Error;

use crate::model::ModelError;
use crate::parser::ParseError;
use crate::simulation::SimulationError;

/// Error raised by application handler code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// A recoverable problem inside one step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("handler '{method}' failed: {message}")]
    Handler { method: String, message: String },

    #[error("transition '{value}' from '{state}' reached its limit of {max}")]
    LimitExceeded {
        state: String,
        value: String,
        max: u32,
    },

    #[error("state '{state}' has no transition for value '{value}'")]
    UnknownValue { state: String, value: String },

    #[error("dangling reference: {0}")]
    MissingBlock(#[from] ModelError),
}

impl StepError {
    pub(crate) fn handler(method: &str, err: HandlerError) -> Self {
        StepError::Handler {
            method: method.to_string(),
            message: err.message,
        }
    }
}

/// A fatal interpreter error.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    #[error("unrecoverable failure in state '{state}': {cause}")]
    Unrecoverable { state: String, cause: String },

    #[error("update hook '{hook}' is not defined")]
    MissingUpdateHook { hook: String },

    #[error("update hook '{hook}' failed: {message}")]
    Update { hook: String, message: String },
}

pub type InterpreterResult<T> = Result<T, InterpreterError>;
