use std::collections::HashMap;

use super::{SimulationError, TransitionSource};
use crate::parser::parse_script;

/// Replays scripted values per state.
///
/// Each state has its own cursor; once a state's values run out the last one
/// repeats. Repeated blocks for the same state are concatenated.
#[derive(Debug, Clone, Default)]
pub struct ScriptInterpreter {
    values: HashMap<String, Vec<String>>,
    cursors: HashMap<String, usize>,
}

impl ScriptInterpreter {
    pub fn parse(source: &str) -> Result<Self, SimulationError> {
        Ok(Self::from_groups(parse_script(source)?))
    }

    pub fn from_groups(groups: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (state, group) in groups {
            values.entry(state).or_default().extend(group);
        }
        Self {
            values,
            cursors: HashMap::new(),
        }
    }
}

impl TransitionSource for ScriptInterpreter {
    fn name(&self) -> &'static str {
        "script"
    }

    fn reset(&mut self) {
        self.cursors.clear();
    }

    fn next_value(&mut self, state: &str, _method: &str) -> Result<String, SimulationError> {
        let values = self
            .values
            .get(state)
            .ok_or_else(|| SimulationError::UnknownState {
                state: state.to_string(),
            })?;
        let last = values.len().checked_sub(1).ok_or_else(|| SimulationError::NoValues {
            state: state.to_string(),
        })?;

        let cursor = self.cursors.entry(state.to_string()).or_insert(0);
        let value = values[(*cursor).min(last)].clone();
        *cursor += 1;
        Ok(value)
    }
}
