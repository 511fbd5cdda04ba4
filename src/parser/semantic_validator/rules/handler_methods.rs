//! Rule: Handler Methods
//!
//! Every block state needs a state handler and every transition method needs
//! a selector in the handler catalog. `finish`, `failure` and `terminate`
//! have built-in defaults, and `emptyTransition` is always available.
//!
//! Skipped entirely when no catalog is supplied.

use crate::model::{is_builtin_state, DEFAULT_TRANSITION_METHOD};

use super::super::{IssueKind, ValidationInput, ValidationIssue, ValidationRule};

pub struct HandlerMethodsRule;

impl ValidationRule for HandlerMethodsRule {
    fn id(&self) -> &'static str {
        "handler-methods"
    }

    fn description(&self) -> &'static str {
        "State handlers and transition selectors must exist"
    }

    fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue> {
        let Some(catalog) = input.catalog else {
            return Vec::new();
        };
        let mut issues = Vec::new();

        for block in input.machine.blocks() {
            let state = block.state();
            if !is_builtin_state(state) && !catalog.has_state(state) {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::MissingStateMethod,
                        state,
                        format!("no state handler for '{}'", state),
                        self.id(),
                    )
                    .at_line(block.line()),
                );
            }
        }

        for method in input.machine.all_transition_methods() {
            if method == DEFAULT_TRANSITION_METHOD || catalog.has_transition(method) {
                continue;
            }
            // Report against the first block that uses it
            let Some(block) = input.machine.blocks().iter().find(|b| b.method() == method) else {
                continue;
            };
            issues.push(
                ValidationIssue::error(
                    IssueKind::MissingTransitionMethod,
                    block.state(),
                    format!("no transition selector '{}' (used by '{}')", method, block.state()),
                    self.id(),
                )
                .with_value(method)
                .at_line(block.line()),
            );
        }

        issues
    }
}
