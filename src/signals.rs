//! Termination signals
//!
//! Termination is cooperative: the interpreter polls its `SignalSource` at
//! the start of every step and consumes the signal once acted on.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationSignal {
    pub id: Uuid,
    pub reason: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl TerminationSignal {
    pub fn new(reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reason,
            sent_at: Utc::now(),
        }
    }
}

pub trait SignalSource: Send {
    /// The oldest unconsumed termination signal for `task_id`
    fn pending_termination(&self, task_id: &str) -> Option<TerminationSignal>;

    /// Mark a signal as handled
    fn consume(&mut self, task_id: &str, signal_id: Uuid);
}

/// A source that never signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

impl SignalSource for NoSignals {
    fn pending_termination(&self, _task_id: &str) -> Option<TerminationSignal> {
        None
    }

    fn consume(&mut self, _task_id: &str, _signal_id: Uuid) {}
}

/// In-memory signal queue. Clones share the same queue, so an operator can
/// keep one handle while the interpreter owns another.
#[derive(Debug, Clone, Default)]
pub struct SignalQueue {
    inner: Arc<Mutex<HashMap<String, VecDeque<TerminationSignal>>>>,
}

impl SignalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a termination signal for `task_id` and return its id
    pub fn send_termination(&self, task_id: &str, reason: Option<String>) -> Uuid {
        let signal = TerminationSignal::new(reason);
        let id = signal.id;
        self.lock()
            .entry(task_id.to_string())
            .or_default()
            .push_back(signal);
        debug!(task_id = %task_id, signal_id = %id, "Queued termination signal");
        id
    }

    /// Unconsumed signals for `task_id`, oldest first
    pub fn pending(&self, task_id: &str) -> Vec<TerminationSignal> {
        self.lock()
            .get(task_id)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<TerminationSignal>>> {
        // A panic while holding the lock leaves the queue itself consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SignalSource for SignalQueue {
    fn pending_termination(&self, task_id: &str) -> Option<TerminationSignal> {
        self.lock().get(task_id).and_then(|queue| queue.front().cloned())
    }

    fn consume(&mut self, task_id: &str, signal_id: Uuid) {
        if let Some(queue) = self.lock().get_mut(task_id) {
            queue.retain(|s| s.id != signal_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_queue() {
        let operator = SignalQueue::new();
        let mut source = operator.clone();

        let id = operator.send_termination("t1", Some("operator request".to_string()));
        let pending = source.pending_termination("t1").unwrap();
        assert_eq!(pending.id, id);
        assert!(source.pending_termination("t2").is_none());

        source.consume("t1", id);
        assert!(operator.pending("t1").is_empty());
    }

    #[test]
    fn test_oldest_signal_first() {
        let queue = SignalQueue::new();
        let first = queue.send_termination("t1", None);
        queue.send_termination("t1", None);
        assert_eq!(queue.pending_termination("t1").unwrap().id, first);
        assert_eq!(queue.pending("t1").len(), 2);
    }
}
