//! All transitions leaving one state

use serde::{Deserialize, Serialize};

use super::transition::Transition;
use super::{ModelError, DEFAULT_TIMER, DEFAULT_TRANSITION_METHOD, ERROR_VALUE, TERMINATE_REQUESTED, WILDCARD};

/// Outgoing edges of one state, the selector method that picks among them and
/// the timer charged while the task sits in the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionBlock {
    state: String,
    method: String,
    timer: String,
    /// Declaration order is preserved for transcripts and reports
    transitions: Vec<Transition>,
    /// Line of the block header
    line: usize,
}

impl TransitionBlock {
    pub fn new(state: impl Into<String>, line: usize) -> Self {
        Self {
            state: state.into(),
            method: DEFAULT_TRANSITION_METHOD.to_string(),
            timer: DEFAULT_TIMER.to_string(),
            transitions: Vec::new(),
            line,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_timer(mut self, timer: impl Into<String>) -> Self {
        self.timer = timer.into();
        self
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn timer(&self) -> &str {
        &self.timer
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Add a transition; a value may only be declared once per block.
    pub fn add_transition(&mut self, transition: Transition) -> Result<(), ModelError> {
        if let Some(existing) = self.transition(transition.value()) {
            return Err(ModelError::DuplicateValue {
                state: self.state.clone(),
                value: transition.value().to_string(),
                first_line: existing.line(),
            });
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// Exact lookup, no wildcard
    pub fn transition(&self, value: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.value() == value)
    }

    /// Resolve a selector value to the transition to take.
    ///
    /// Exact match first, then `*` unless the value is `!`. The
    /// `terminateRequested` route is always resolvable.
    pub fn find_next_transition(&self, value: &str) -> Option<Transition> {
        if let Some(found) = self.transition(value) {
            return Some(found.clone());
        }
        if value == TERMINATE_REQUESTED {
            return Some(Transition::synthetic_terminate());
        }
        if value == ERROR_VALUE {
            return None;
        }
        self.transition(WILDCARD).cloned()
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.transitions.iter().map(|t| t.value())
    }

    pub fn has_wildcard(&self) -> bool {
        self.transition(WILDCARD).is_some()
    }
}
