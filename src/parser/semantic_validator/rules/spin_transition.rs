//! Rule: Spin Transition
//!
//! A transition back into its own state with `wait=0` asks the scheduler to
//! run the task again immediately, which is usually a busy loop.
//!
//! ```text
//! poll:check {
//!     pending poll            # warning: spin
//!     pending poll wait=30    # ok
//! }
//! ```

use super::super::{IssueKind, ValidationInput, ValidationIssue, ValidationRule};

pub struct SpinTransitionRule;

impl ValidationRule for SpinTransitionRule {
    fn id(&self) -> &'static str {
        "spin-transition"
    }

    fn description(&self) -> &'static str {
        "Self-transitions should wait before re-entering the state"
    }

    fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue> {
        input
            .machine
            .blocks()
            .iter()
            .flat_map(|block| {
                block
                    .transitions()
                    .iter()
                    .filter(|t| t.is_spin(block.state()))
                    .map(move |t| {
                        ValidationIssue::warning(
                            IssueKind::SpinTransition,
                            block.state(),
                            format!(
                                "'{}' on value '{}' re-enters itself without a wait",
                                block.state(),
                                t.value()
                            ),
                            self.id(),
                        )
                        .with_value(t.value())
                        .at_line(t.line())
                    })
            })
            .collect()
    }
}
