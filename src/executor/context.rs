//! Per-state context and the view handlers get of the running task

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::{ExitStatus, TaskStatus};

/// Data kept for one state across visits. Serialized with the task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateContext {
    visits: u32,
    first_entered_at: Option<DateTime<Utc>>,
    last_entered_at: Option<DateTime<Utc>>,
    /// Free-form handler data
    data: BTreeMap<String, JsonValue>,
}

impl StateContext {
    pub fn visits(&self) -> u32 {
        self.visits
    }

    pub fn first_entered_at(&self) -> Option<DateTime<Utc>> {
        self.first_entered_at
    }

    pub fn last_entered_at(&self) -> Option<DateTime<Utc>> {
        self.last_entered_at
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    /// Typed read; `None` when absent or of the wrong shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.data.remove(key)
    }

    pub(crate) fn record_visit(&mut self, at: DateTime<Utc>) {
        self.visits += 1;
        self.first_entered_at.get_or_insert(at);
        self.last_entered_at = Some(at);
    }
}

/// What a state handler or selector can see and change.
pub struct HandlerContext<'a> {
    task_id: &'a str,
    state: &'a str,
    context: &'a mut StateContext,
    exit: &'a mut Option<ExitStatus>,
    cause: Option<&'a str>,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        task_id: &'a str,
        state: &'a str,
        context: &'a mut StateContext,
        exit: &'a mut Option<ExitStatus>,
        cause: Option<&'a str>,
    ) -> Self {
        Self {
            task_id,
            state,
            context,
            exit,
            cause,
        }
    }

    pub fn task_id(&self) -> &str {
        self.task_id
    }

    pub fn state(&self) -> &str {
        self.state
    }

    pub fn context(&self) -> &StateContext {
        self.context
    }

    pub fn context_mut(&mut self) -> &mut StateContext {
        self.context
    }

    /// Why the task was routed here, when it arrived via an error
    pub fn cause(&self) -> Option<&str> {
        self.cause
    }

    pub fn exit_status(&self) -> Option<&ExitStatus> {
        self.exit.as_ref()
    }

    pub fn set_exit(&mut self, status: TaskStatus, message: Option<String>) {
        *self.exit = Some(ExitStatus::new(status, message));
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.set_exit(TaskStatus::Failed, Some(message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visits_track_first_and_last() {
        let mut ctx = StateContext::default();
        let first = Utc::now();
        let later = first + chrono::Duration::seconds(5);
        ctx.record_visit(first);
        ctx.record_visit(later);

        assert_eq!(ctx.visits(), 2);
        assert_eq!(ctx.first_entered_at(), Some(first));
        assert_eq!(ctx.last_entered_at(), Some(later));
    }

    #[test]
    fn test_typed_data() {
        let mut ctx = StateContext::default();
        ctx.set("attempt", 3);
        ctx.set("host", "db-1");

        assert_eq!(ctx.get_as::<u32>("attempt"), Some(3));
        assert_eq!(ctx.get_as::<String>("host").as_deref(), Some("db-1"));
        assert_eq!(ctx.get_as::<u32>("host"), None);
    }

    #[test]
    fn test_handler_context_sets_exit() {
        let mut ctx = StateContext::default();
        let mut exit = None;
        {
            let mut handler_ctx = HandlerContext::new("t1", "a", &mut ctx, &mut exit, Some("boom"));
            assert_eq!(handler_ctx.cause(), Some("boom"));
            handler_ctx.fail("bad input");
        }
        assert_eq!(
            exit,
            Some(ExitStatus::new(TaskStatus::Failed, Some("bad input".to_string())))
        );
    }
}
