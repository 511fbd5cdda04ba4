//! Versioned schema migration on resume
//!
//! A handler reports a schema version per component. When a stored task is
//! resumed with newer code, hooks named `update{Component}{N}` run for every
//! version between the stored one and the code's, in order. A hook records
//! its intent through the `UpdateCoordinator`; the effects are applied
//! together once the hook returns.

use tracing::{debug, info, warn};

use crate::executor::errors::{InterpreterError, InterpreterResult};
use crate::executor::handler::TaskHandler;
use crate::executor::state::{Phase, TaskState};
use crate::model::{ModelError, StateMachine};

/// The name of the hook that migrates `component` to version `version`
pub fn hook_name(component: &str, version: u32) -> String {
    let mut chars = component.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("update{}{}", capitalized, version)
}

#[derive(Debug, Default)]
struct UpdateEffects {
    restart: bool,
    new_state: Option<String>,
    reset_all: bool,
    reset_states: Vec<String>,
    reset_transitions: Vec<(String, String)>,
}

/// What an update hook may ask for.
pub struct UpdateCoordinator<'a> {
    machine: &'a StateMachine,
    current_state: Option<&'a str>,
    effects: UpdateEffects,
}

impl<'a> UpdateCoordinator<'a> {
    pub fn new(machine: &'a StateMachine, current_state: Option<&'a str>) -> Self {
        Self {
            machine,
            current_state,
            effects: UpdateEffects::default(),
        }
    }

    /// The state the task is in, `None` if it hasn't started
    pub fn current_state(&self) -> Option<&str> {
        self.current_state
    }

    pub fn machine(&self) -> &StateMachine {
        self.machine
    }

    /// Move the task to `state` once the hook returns
    pub fn set_new_state(&mut self, state: impl Into<String>) {
        self.effects.new_state = Some(state.into());
    }

    /// Start the task over. Overrides every other request from the hook.
    pub fn restart(&mut self) {
        self.effects.restart = true;
    }

    pub fn reset_all_counters(&mut self) {
        self.effects.reset_all = true;
    }

    pub fn reset_state_transition_counters(&mut self, state: impl Into<String>) {
        self.effects.reset_states.push(state.into());
    }

    pub fn reset_transition_count(&mut self, state: impl Into<String>, value: impl Into<String>) {
        self.effects.reset_transitions.push((state.into(), value.into()));
    }

    fn into_effects(self) -> UpdateEffects {
        self.effects
    }
}

/// Bring `state` up to the handler's schema versions.
pub(crate) fn apply_updates<H: TaskHandler>(
    handler: &mut H,
    machine: &StateMachine,
    state: &mut TaskState,
) -> InterpreterResult<()> {
    for (component, code_version) in handler.schema_versions() {
        let stored = match state.versions.get(&component) {
            Some(&stored) => stored,
            None => {
                info!(component = %component, version = code_version, "Adopting component version");
                state.versions.insert(component, code_version);
                continue;
            }
        };
        if stored > code_version {
            warn!(
                component = %component,
                stored,
                code_version,
                "Stored schema version is newer than the code"
            );
            continue;
        }

        for version in stored + 1..=code_version {
            let hook = hook_name(&component, version);
            debug!(hook = %hook, "Running update hook");

            let mut coordinator = UpdateCoordinator::new(machine, state.current_state.as_deref());
            match handler.run_update(&hook, &mut coordinator) {
                None => return Err(InterpreterError::MissingUpdateHook { hook }),
                Some(Err(err)) => {
                    return Err(InterpreterError::Update {
                        hook,
                        message: err.message,
                    })
                }
                Some(Ok(())) => {}
            }
            let effects = coordinator.into_effects();
            apply_effects(machine, state, effects)?;
            state.versions.insert(component.clone(), version);
            info!(hook = %hook, "Update hook applied");
        }
    }
    Ok(())
}

fn apply_effects(
    machine: &StateMachine,
    state: &mut TaskState,
    effects: UpdateEffects,
) -> InterpreterResult<()> {
    if effects.restart {
        state.phase = Phase::NotStarted;
        state.current_state = None;
        state.transition_counts.clear();
        state.contexts.clear();
        state.exit = None;
        return Ok(());
    }

    if let Some(new_state) = effects.new_state {
        if !machine.is_known_state(&new_state) {
            return Err(ModelError::MissingBlock { state: new_state }.into());
        }
        state.current_state = Some(new_state);
        if state.phase == Phase::NotStarted {
            state.phase = Phase::Running;
        }
    }

    if effects.reset_all {
        state.transition_counts.clear();
    }
    for block_state in &effects.reset_states {
        state.clear_state_counts(machine, block_state)?;
    }
    for (block_state, value) in &effects.reset_transitions {
        if !state.clear_transition_count(machine, block_state, value)? {
            warn!(state = %block_state, value = %value, "No transition to reset");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_names() {
        assert_eq!(hook_name("job", 2), "updateJob2");
        assert_eq!(hook_name("Schema", 10), "updateSchema10");
    }

    #[test]
    fn test_restart_short_circuits_other_effects() {
        let machine = StateMachine::compile("a {\n ok b\n}\nb {\n '*' finish\n}\n").unwrap();
        let mut state = TaskState::new("t", machine.source_hash());
        state.phase = Phase::Running;
        state.current_state = Some("b".to_string());
        state.transition_counts.insert(2, 1);

        let effects = UpdateEffects {
            restart: true,
            new_state: Some("nowhere".to_string()),
            ..Default::default()
        };
        apply_effects(&machine, &mut state, effects).unwrap();

        assert_eq!(state.phase, Phase::NotStarted);
        assert!(state.current_state.is_none());
        assert!(state.transition_counts.is_empty());
    }

    #[test]
    fn test_new_state_must_exist() {
        let machine = StateMachine::compile("a {\n ok b\n}\n").unwrap();
        let mut state = TaskState::new("t", machine.source_hash());
        let effects = UpdateEffects {
            new_state: Some("nowhere".to_string()),
            ..Default::default()
        };
        let err = apply_effects(&machine, &mut state, effects).unwrap_err();
        assert!(matches!(err, InterpreterError::Model(ModelError::MissingBlock { .. })));
    }
}
