//! Append-only record of what a task did
//!
//! Every step appends a TRANSITION event followed by a STATE event. From the
//! recording we can render a human transcript, compare two runs, and derive
//! scripts that replay the same run through the simulation interpreters.

mod diff;

pub use diff::{diff_transcripts, normalize_transcript};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::quote_value;

#[cfg(test)]
mod tests;

/// Where a transition's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionOrigin {
    /// A selector (or simulation substitute) was consulted
    Selector,
    /// Error routing after a state handler failed
    Fallback,
    /// A termination signal
    Signal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    State {
        name: String,
        /// False when entered through an `exec=false` transition or in simulation
        executed: bool,
        at: DateTime<Utc>,
    },
    Transition {
        /// State the transition leaves
        state: String,
        method: String,
        /// Value actually transitioned on
        value: String,
        /// Value the selector returned, when a fallback replaced it
        requested: Option<String>,
        origin: TransitionOrigin,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::State { at, .. } | Event::Transition { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    events: Vec<Event>,
    added_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, name: &str, executed: bool) {
        self.add_state_at(name, executed, Utc::now());
    }

    pub fn add_state_at(&mut self, name: &str, executed: bool, at: DateTime<Utc>) {
        self.events.push(Event::State {
            name: name.to_string(),
            executed,
            at,
        });
    }

    pub fn add_transition(
        &mut self,
        state: &str,
        method: &str,
        value: &str,
        requested: Option<&str>,
        origin: TransitionOrigin,
    ) {
        self.add_transition_at(state, method, value, requested, origin, Utc::now());
    }

    pub fn add_transition_at(
        &mut self,
        state: &str,
        method: &str,
        value: &str,
        requested: Option<&str>,
        origin: TransitionOrigin,
        at: DateTime<Utc>,
    ) {
        self.events.push(Event::Transition {
            state: state.to_string(),
            method: method.to_string(),
            value: value.to_string(),
            requested: requested.map(str::to_string),
            origin,
            at,
        });
    }

    pub fn mark_added(&mut self, at: DateTime<Utc>) {
        self.added_at.get_or_insert(at);
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        self.started_at.get_or_insert(at);
    }

    pub fn mark_ended(&mut self, at: DateTime<Utc>) {
        self.ended_at.get_or_insert(at);
    }

    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        self.added_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// States in the order they were entered
    pub fn visited_states(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::State { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// One line per event, prefixed with the time since the run started.
    ///
    /// ```text
    /// [+0.000s] STATE start
    /// [+0.002s] TRANSITION start:emptyTransition '' -> a
    /// [+0.002s] STATE a
    /// ```
    pub fn transcript(&self) -> String {
        let origin = self
            .started_at
            .or_else(|| self.events.first().map(Event::at));
        let mut lines = Vec::with_capacity(self.events.len());

        for (idx, event) in self.events.iter().enumerate() {
            let elapsed = origin
                .map(|o| (event.at() - o).num_milliseconds().max(0))
                .unwrap_or(0);
            let stamp = format!("[+{}.{:03}s]", elapsed / 1000, elapsed % 1000);

            let body = match event {
                Event::State { name, executed, .. } => {
                    if *executed {
                        format!("STATE {}", name)
                    } else {
                        format!("STATE {} (not executed)", name)
                    }
                }
                Event::Transition {
                    state,
                    method,
                    value,
                    requested,
                    origin,
                    ..
                } => {
                    let target = match self.events.get(idx + 1) {
                        Some(Event::State { name, .. }) => Some(name.as_str()),
                        _ => None,
                    };
                    let mut line = format!(
                        "TRANSITION {}:{} {}",
                        state,
                        method,
                        quote_value(value)
                    );
                    if let Some(target) = target {
                        line.push_str(&format!(" -> {}", target));
                    }
                    if let Some(requested) = requested {
                        line.push_str(&format!(" (requested {})", quote_value(requested)));
                    }
                    match origin {
                        TransitionOrigin::Selector => {}
                        TransitionOrigin::Fallback => line.push_str(" [fallback]"),
                        TransitionOrigin::Signal => line.push_str(" [signal]"),
                    }
                    line
                }
            };
            lines.push(format!("{} {}", stamp, body));
        }
        lines.join("\n")
    }

    /// Differences between this run's transcript and `other`, ignoring
    /// timestamps. Empty when the runs are equivalent.
    pub fn diff(&self, other: &str) -> String {
        diff_transcripts(&self.transcript(), other)
    }

    /// Values the selectors produced, as `(state, value)` in step order
    fn selector_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events.iter().filter_map(|e| match e {
            Event::Transition {
                state,
                value,
                requested,
                origin: TransitionOrigin::Selector,
                ..
            } => Some((
                state.as_str(),
                requested.as_deref().unwrap_or(value.as_str()),
            )),
            _ => None,
        })
    }

    /// A simulation script that replays this run's selector values
    pub fn simulation_script(&self) -> String {
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        for (state, value) in self.selector_values() {
            match groups.iter_mut().find(|(s, _)| *s == state) {
                Some((_, values)) => values.push(value),
                None => groups.push((state, vec![value])),
            }
        }

        let mut out = String::new();
        for (state, values) in groups {
            out.push_str(state);
            out.push_str(" {\n");
            for value in values {
                out.push_str("    ");
                out.push_str(&quote_value(value));
                out.push('\n');
            }
            out.push_str("}\n");
        }
        out
    }

    /// A verification script asserting this run's visit order and values
    pub fn verification_script(&self) -> String {
        self.selector_values()
            .map(|(state, value)| format!("{} {}\n", state, quote_value(value)))
            .collect()
    }
}
