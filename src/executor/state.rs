//! Serializable runtime state of one task
//!
//! Everything the interpreter needs to resume a task after a restart. The
//! crate only produces and consumes it; storing it is the scheduler's job.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::StateContext;
use super::timers::TimerSet;
use crate::model::{ModelError, StateMachine, TransitionId, WILDCARD};
use crate::recording::Recording;
use crate::types::ExitStatus;

/// Lifecycle phase. `Finished` and `Terminated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Running,
    Finished,
    Terminated,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Terminated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub phase: Phase,
    pub current_state: Option<String>,
    /// Traversals per transition declaration
    pub transition_counts: BTreeMap<TransitionId, u32>,
    pub contexts: BTreeMap<String, StateContext>,
    pub timers: TimerSet,
    pub exit: Option<ExitStatus>,
    /// Schema version per component
    pub versions: BTreeMap<String, u32>,
    pub recording: Recording,
    /// Hash of the table this state was produced with
    pub table_hash: String,
    pub created_at: DateTime<Utc>,
}

impl TaskState {
    pub fn new(task_id: impl Into<String>, table_hash: impl Into<String>) -> Self {
        let created_at = Utc::now();
        let mut recording = Recording::new();
        recording.mark_added(created_at);
        Self {
            task_id: task_id.into(),
            phase: Phase::NotStarted,
            current_state: None,
            transition_counts: BTreeMap::new(),
            contexts: BTreeMap::new(),
            timers: TimerSet::default(),
            exit: None,
            versions: BTreeMap::new(),
            recording,
            table_hash: table_hash.into(),
            created_at,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn transition_count(&self, id: TransitionId) -> u32 {
        self.transition_counts.get(&id).copied().unwrap_or(0)
    }

    pub(crate) fn increment(&mut self, id: TransitionId) -> u32 {
        let count = self.transition_counts.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// Reset the counter of the transition `value` (exact, else `*`) leaving
    /// `state`. Returns false when neither is declared.
    pub(crate) fn clear_transition_count(
        &mut self,
        machine: &StateMachine,
        state: &str,
        value: &str,
    ) -> Result<bool, ModelError> {
        let block = machine.transition_block(state)?;
        match block.transition(value).or_else(|| block.transition(WILDCARD)) {
            Some(transition) => {
                self.transition_counts.remove(&transition.id());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset the counters of every transition leaving `state`
    pub(crate) fn clear_state_counts(
        &mut self,
        machine: &StateMachine,
        state: &str,
    ) -> Result<(), ModelError> {
        let block = machine.transition_block(state)?;
        for transition in block.transitions() {
            self.transition_counts.remove(&transition.id());
        }
        Ok(())
    }
}
