//! Rule: Reachability
//!
//! Two checks over the transition graph:
//!
//! - every target must be `finish` or have its own block
//! - every state must have some path to `finish`
//!
//! The path check walks backwards from `finish` over the inverted edges, so
//! loops are fine as long as some exit leads out.
//!
//! ```text
//! a { ok b }
//! b { '*' a }     # error: no path to finish from 'a' or 'b'
//! ```

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::model::{StateMachine, FINISH_STATE};

use super::super::{IssueKind, ValidationInput, ValidationIssue, ValidationRule};
use super::required_states::REQUIRED_STATES;

pub struct ReachabilityRule;

impl ValidationRule for ReachabilityRule {
    fn id(&self) -> &'static str {
        "reachability"
    }

    fn description(&self) -> &'static str {
        "Targets must exist and every state must be able to reach finish"
    }

    fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue> {
        let machine = input.machine;
        let mut issues = Vec::new();

        // Required states are reported by their own rule
        let mut reported: BTreeSet<&str> = REQUIRED_STATES.iter().copied().collect();
        for block in machine.blocks() {
            for transition in block.transitions() {
                let target = transition.target();
                if machine.is_known_state(target) || !reported.insert(target) {
                    continue;
                }
                issues.push(
                    ValidationIssue::error(
                        IssueKind::MissingBlock,
                        target,
                        format!(
                            "state '{}' (target of '{}' on line {}) has no transition block",
                            target,
                            block.state(),
                            transition.line()
                        ),
                        self.id(),
                    )
                    .with_value(transition.value())
                    .at_line(transition.line()),
                );
            }
        }

        let reaches_finish = states_reaching_finish(machine);
        for block in machine.blocks() {
            if !reaches_finish.contains(block.state()) {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::NoPathToFinish,
                        block.state(),
                        format!("no path from '{}' leads to finish", block.state()),
                        self.id(),
                    )
                    .at_line(block.line()),
                );
            }
        }

        issues
    }
}

/// Walk the inverted edges back from `finish`. Every state reached can
/// get to `finish`; each edge is looked at once.
fn states_reaching_finish(machine: &StateMachine) -> HashSet<&str> {
    let mut sources: HashMap<&str, Vec<&str>> = HashMap::new();
    for block in machine.blocks() {
        for transition in block.transitions() {
            sources
                .entry(transition.target())
                .or_default()
                .push(block.state());
        }
    }

    let mut reached: HashSet<&str> = HashSet::from([FINISH_STATE]);
    let mut pending: VecDeque<&str> = VecDeque::from([FINISH_STATE]);
    while let Some(state) = pending.pop_front() {
        for &source in sources.get(state).into_iter().flatten() {
            if reached.insert(source) {
                pending.push_back(source);
            }
        }
    }
    reached
}
