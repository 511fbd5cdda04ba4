//! Stepwise execution of a compiled state table
//!
//! - `handler`: the capability the interpreter calls into
//! - `registry`: closure-table implementation of that capability
//! - `interpreter`: `step()` and its routing policies
//! - `state`: the serializable runtime state

pub mod context;
pub mod errors;
pub mod handler;
pub mod interpreter;
pub mod registry;
pub mod state;
pub mod timers;

pub use context::{HandlerContext, StateContext};
pub use errors::{HandlerError, HandlerResult, InterpreterError, InterpreterResult, StepError};
pub use handler::{DeclaredValue, HandlerCatalog, NullHandler, TaskHandler};
pub use interpreter::{initialize, Interpreter, InterpreterBuilder, PauseFlag, DEFAULT_PAUSE_WAIT};
pub use registry::HandlerRegistry;
pub use state::{Phase, TaskState};
pub use timers::TimerSet;

#[cfg(test)]
mod tests;
