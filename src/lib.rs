pub mod cli;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod recording;
pub mod runner;
pub mod signals;
pub mod simulation;
pub mod types;
pub mod update;

// Re-export main types
pub use types::*;

// Re-export the embedding API for convenience
pub use executor::{initialize, Interpreter, InterpreterBuilder, TaskHandler};
pub use model::StateMachine;
pub use parser::parse_state_table;
