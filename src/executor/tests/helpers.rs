//! Test helpers for interpreter tests
//!
//! `Probe` is a scripted task: selectors return queued answers (sticking on
//! the last one) and state handlers log their calls, failing on demand.

use std::collections::{HashMap, HashSet};

use crate::executor::{HandlerRegistry, Interpreter, InterpreterBuilder};
use crate::model::StateMachine;
use crate::types::StepResult;

/// Selector answer that makes the selector return an error
pub const RAISE: &str = "<raise>";

#[derive(Debug, Default)]
pub struct Probe {
    /// `enter:<state>` and `select:<method>` in call order
    pub calls: Vec<String>,
    answers: HashMap<String, Vec<String>>,
    cursors: HashMap<String, usize>,
    pub failing: HashSet<String>,
}

impl Probe {
    pub fn enter(&mut self, state: &str) -> crate::executor::HandlerResult {
        self.calls.push(format!("enter:{}", state));
        if self.failing.contains(state) {
            return Err(format!("{} exploded", state).into());
        }
        Ok(())
    }

    pub fn select(&mut self, method: &str) -> crate::executor::HandlerResult<String> {
        self.calls.push(format!("select:{}", method));
        let answers = self.answers.get(method).cloned().unwrap_or_default();
        let cursor = self.cursors.entry(method.to_string()).or_insert(0);
        let answer = answers
            .get((*cursor).min(answers.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();
        *cursor += 1;
        if answer == RAISE {
            return Err(format!("{} raised", method).into());
        }
        Ok(answer)
    }

    pub fn entered(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| c.strip_prefix("enter:"))
            .collect()
    }
}

pub fn compile(source: &str) -> StateMachine {
    crate::parser::parse_state_table(source).expect("Parse state table failed")
}

/// Registry with a logging handler for every block state (plus `finish`) and
/// a scripted selector per entry of `answers`.
pub fn probe_handler(
    machine: &StateMachine,
    answers: &[(&str, &[&str])],
    failing: &[&str],
) -> HandlerRegistry<Probe> {
    let mut probe = Probe::default();
    for (method, values) in answers {
        probe
            .answers
            .insert(method.to_string(), values.iter().map(|v| v.to_string()).collect());
    }
    probe.failing = failing.iter().map(|s| s.to_string()).collect();

    let mut registry = HandlerRegistry::new(probe);
    let mut states: Vec<String> = machine.all_states().iter().map(|s| s.to_string()).collect();
    states.push("finish".to_string());
    for state in states {
        registry = registry.state(&state, |probe, ctx| probe.enter(ctx.state()));
    }
    for (method, values) in answers {
        let declared: Vec<(&str, &str)> = values
            .iter()
            .filter(|v| **v != RAISE)
            .map(|v| (*v, "scripted"))
            .collect();
        let name = method.to_string();
        registry = registry.transition(method, &declared, move |probe, _ctx| probe.select(&name));
    }
    registry
}

pub fn builder(
    source: &str,
    answers: &[(&str, &[&str])],
    failing: &[&str],
) -> InterpreterBuilder<HandlerRegistry<Probe>> {
    let machine = compile(source);
    let handler = probe_handler(&machine, answers, failing);
    Interpreter::builder(machine, handler).task_id("test-task")
}

pub fn interpreter(
    source: &str,
    answers: &[(&str, &[&str])],
    failing: &[&str],
) -> Interpreter<HandlerRegistry<Probe>> {
    builder(source, answers, failing)
        .build()
        .expect("Interpreter build failed")
}

/// Step until complete, panicking after `max_steps`
pub fn run_to_end(interp: &mut Interpreter<HandlerRegistry<Probe>>, max_steps: usize) -> Vec<StepResult> {
    let mut results = Vec::new();
    for _ in 0..max_steps {
        let result = interp.step().expect("Step failed");
        let done = result.complete;
        results.push(result);
        if done {
            return results;
        }
    }
    panic!("Task did not complete within {} steps", max_steps);
}

pub fn visited(interp: &Interpreter<HandlerRegistry<Probe>>) -> Vec<String> {
    interp
        .recording()
        .visited_states()
        .into_iter()
        .map(str::to_string)
        .collect()
}
