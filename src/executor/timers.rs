//! Named wall-clock timers charged while a task sits in a state

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{START_DELAY_TIMER, USER_TIMER};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ActiveTimer {
    name: String,
    since: DateTime<Utc>,
}

/// Accumulated milliseconds per timer name. At most one timer runs at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSet {
    totals: BTreeMap<String, u64>,
    active: Option<ActiveTimer>,
}

impl TimerSet {
    /// Switch to timer `name`, charging the running one up to `now`.
    ///
    /// The first engagement of the `user` timer records `start_delay` as the
    /// time between task creation and now, so queueing is kept out of the
    /// user-visible total.
    pub fn engage(&mut self, name: &str, now: DateTime<Utc>, created_at: DateTime<Utc>) {
        if self.active.as_ref().is_some_and(|a| a.name == name) {
            return;
        }
        self.stop(now);

        if name == USER_TIMER && !self.totals.contains_key(START_DELAY_TIMER) {
            self.totals
                .insert(START_DELAY_TIMER.to_string(), elapsed_ms(created_at, now));
        }
        self.active = Some(ActiveTimer {
            name: name.to_string(),
            since: now,
        });
    }

    /// Stop the running timer, if any
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if let Some(active) = self.active.take() {
            *self.totals.entry(active.name).or_default() += elapsed_ms(active.since, now);
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    /// Milliseconds per timer, excluding the running interval
    pub fn durations(&self) -> &BTreeMap<String, u64> {
        &self.totals
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use maplit::btreemap;

    #[test]
    fn test_switching_charges_previous_timer() {
        let created = Utc::now();
        let mut timers = TimerSet::default();
        timers.engage("system", created, created);
        timers.engage("system", created + Duration::milliseconds(100), created);
        timers.engage("user", created + Duration::milliseconds(250), created);
        timers.stop(created + Duration::milliseconds(400));

        assert_eq!(
            timers.durations(),
            &btreemap! {
                "start_delay".to_string() => 250,
                "system".to_string() => 250,
                "user".to_string() => 150,
            }
        );
        assert!(timers.active().is_none());
    }

    #[test]
    fn test_start_delay_set_once_on_first_user_timer() {
        let created = Utc::now();
        let mut timers = TimerSet::default();
        timers.engage("user", created + Duration::seconds(30), created);
        timers.engage("system", created + Duration::seconds(31), created);
        timers.engage("user", created + Duration::seconds(90), created);

        assert_eq!(timers.durations()["start_delay"], 30_000);
    }

    #[test]
    fn test_clock_going_backwards_charges_nothing() {
        let created = Utc::now();
        let mut timers = TimerSet::default();
        timers.engage("system", created, created);
        timers.stop(created - Duration::seconds(1));
        assert_eq!(timers.durations()["system"], 0);
    }
}
