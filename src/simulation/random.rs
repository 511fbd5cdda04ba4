use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{SimulationError, TransitionSource};
use crate::executor::handler::HandlerCatalog;
use crate::model::{StateMachine, DEFAULT_TRANSITION_METHOD, ERROR_VALUE, TERMINATE_REQUESTED};

/// Chance that a step returns `!` when none is configured
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.03;

/// Fuzzes a table by picking legal selector values at random.
///
/// Values come from the catalog's declarations for the block's method; when
/// a method declares nothing the block's own values are used instead.
/// `emptyTransition` always yields `''`.
#[derive(Debug, Clone)]
pub struct RandomInterpreter {
    candidates: HashMap<String, Vec<String>>,
    failure_probability: f64,
    seed: u64,
    rng: StdRng,
}

impl RandomInterpreter {
    pub fn new(machine: &StateMachine, catalog: Option<&dyn HandlerCatalog>) -> Self {
        let declared = catalog.map(|c| c.declared_values()).unwrap_or_default();

        let mut candidates = HashMap::new();
        for block in machine.blocks() {
            let mut values: Vec<String> = declared
                .iter()
                .filter(|d| d.method == block.method())
                .map(|d| d.value.clone())
                .collect();
            if values.is_empty() {
                values = block
                    .values()
                    .filter(|v| *v != ERROR_VALUE && *v != TERMINATE_REQUESTED)
                    .map(str::to_string)
                    .collect();
            }
            candidates.insert(block.state().to_string(), values);
        }

        let seed = rand::thread_rng().gen();
        Self {
            candidates,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fix the seed so runs are repeatable
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_failure_probability(mut self, probability: f64) -> Result<Self, SimulationError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(SimulationError::InvalidProbability(probability));
        }
        self.failure_probability = probability;
        Ok(self)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl TransitionSource for RandomInterpreter {
    fn name(&self) -> &'static str {
        "random"
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn next_value(&mut self, state: &str, method: &str) -> Result<String, SimulationError> {
        if self.rng.gen_bool(self.failure_probability) {
            return Ok(ERROR_VALUE.to_string());
        }
        if method == DEFAULT_TRANSITION_METHOD {
            return Ok(String::new());
        }

        let values = self
            .candidates
            .get(state)
            .ok_or_else(|| SimulationError::UnknownState {
                state: state.to_string(),
            })?;
        // A block with nothing but `!` can only fail
        Ok(values
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| ERROR_VALUE.to_string()))
    }
}
