use super::{SimulationError, TransitionSource};
use crate::parser::parse_verify_script;

/// Strict replay: entry N must be for the N-th state whose selector runs.
#[derive(Debug, Clone, Default)]
pub struct VerifyInterpreter {
    entries: Vec<(String, String)>,
    position: usize,
}

impl VerifyInterpreter {
    pub fn parse(source: &str) -> Result<Self, SimulationError> {
        Ok(Self::from_entries(parse_verify_script(source)?))
    }

    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self {
            entries,
            position: 0,
        }
    }

    /// True once every entry has been consumed
    pub fn is_finished(&self) -> bool {
        self.position >= self.entries.len()
    }
}

impl TransitionSource for VerifyInterpreter {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn next_value(&mut self, state: &str, _method: &str) -> Result<String, SimulationError> {
        let (expected, value) =
            self.entries
                .get(self.position)
                .ok_or_else(|| SimulationError::Exhausted {
                    state: state.to_string(),
                })?;
        if expected != state {
            return Err(SimulationError::Mismatch {
                position: self.position + 1,
                expected: expected.clone(),
                actual: state.to_string(),
            });
        }
        self.position += 1;
        Ok(value.clone())
    }
}
