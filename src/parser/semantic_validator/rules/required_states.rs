//! Rule: Required States
//!
//! Every table needs `failure` and `terminate` blocks: the interpreter routes
//! errors and termination signals there. A missing one is reported as a
//! missing block.
//!
//! ```text
//! start { '*' finish }
//! failure { '*' finish }
//! # error: state 'terminate' has no transition block
//! ```

use crate::model::{FAILURE_STATE, TERMINATE_STATE};

use super::super::{IssueKind, ValidationInput, ValidationIssue, ValidationRule};

pub(crate) const REQUIRED_STATES: &[&str] = &[FAILURE_STATE, TERMINATE_STATE];

pub struct RequiredStatesRule;

impl ValidationRule for RequiredStatesRule {
    fn id(&self) -> &'static str {
        "required-states"
    }

    fn description(&self) -> &'static str {
        "failure and terminate must have transition blocks"
    }

    fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue> {
        REQUIRED_STATES
            .iter()
            .filter(|state| !input.machine.has_block(state))
            .map(|state| {
                ValidationIssue::error(
                    IssueKind::MissingBlock,
                    *state,
                    format!("required state '{}' has no transition block", state),
                    self.id(),
                )
            })
            .collect()
    }
}
