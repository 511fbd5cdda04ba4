//! A single edge of the state table

use serde::{Deserialize, Serialize};

use super::{ERROR_VALUE, FAILURE_STATE, TERMINATE_REQUESTED, TERMINATE_STATE};

/// Identity of a transition: the 1-based source line it was declared on.
///
/// Synthetic transitions use line 0 and are never counted.
pub type TransitionId = usize;

/// One outgoing edge of a state.
///
/// Counters are tracked per declaration, so two transitions with identical
/// value and target on different lines are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    value: String,
    target: String,
    /// Seconds the scheduler should wait before the next step
    wait: u32,
    /// Maximum traversals of this declaration, 0 = unlimited
    max: u32,
    /// When false the target state's handler is not invoked
    exec: bool,
    line: usize,
}

impl Transition {
    pub fn new(value: impl Into<String>, target: impl Into<String>, line: usize) -> Self {
        Self {
            value: value.into(),
            target: target.into(),
            wait: 0,
            max: 0,
            exec: true,
            line,
        }
    }

    pub fn with_wait(mut self, wait: u32) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max(mut self, max: u32) -> Self {
        self.max = max;
        self
    }

    pub fn with_exec(mut self, exec: bool) -> Self {
        self.exec = exec;
        self
    }

    /// The implicit `! -> failure` route available from every state
    pub fn synthetic_failure() -> Self {
        Self::new(ERROR_VALUE, FAILURE_STATE, 0)
    }

    /// The implicit `terminateRequested -> terminate` route
    pub fn synthetic_terminate() -> Self {
        Self::new(TERMINATE_REQUESTED, TERMINATE_STATE, 0)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn wait(&self) -> u32 {
        self.wait
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn exec(&self) -> bool {
        self.exec
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn id(&self) -> TransitionId {
        self.line
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }

    /// A transition back to its own state with no wait risks a busy loop
    pub fn is_spin(&self, from_state: &str) -> bool {
        self.target == from_state && self.wait == 0
    }
}
