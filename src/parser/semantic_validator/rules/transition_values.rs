//! Rule: Transition Values
//!
//! Cross-references each block against the values its selector declares:
//!
//! - a value the table handles but the selector never returns is
//!   unrecognized (`*` and `!` are always fine)
//! - a value the selector may return but the block doesn't handle is unused,
//!   unless the block has a `*` wildcard
//!
//! `emptyTransition` always declares `''`. Blocks whose selector is missing
//! are skipped since `handler-methods` already reports them.

use std::collections::BTreeSet;

use crate::model::{DEFAULT_TRANSITION_METHOD, ERROR_VALUE, WILDCARD};

use super::super::{declared_values, IssueKind, ValidationInput, ValidationIssue, ValidationRule};

pub struct TransitionValuesRule;

impl ValidationRule for TransitionValuesRule {
    fn id(&self) -> &'static str {
        "transition-values"
    }

    fn description(&self) -> &'static str {
        "Values in the table must match the values selectors declare"
    }

    fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue> {
        let Some(catalog) = input.catalog else {
            return Vec::new();
        };
        let declared = declared_values(catalog);
        let mut issues = Vec::new();

        for block in input.machine.blocks() {
            let method = block.method();
            let is_default = method == DEFAULT_TRANSITION_METHOD;
            if !is_default && !catalog.has_transition(method) {
                continue;
            }

            let mut legal: BTreeSet<&str> = declared
                .get(method)
                .map(|values| values.iter().map(String::as_str).collect())
                .unwrap_or_default();
            if is_default {
                legal.insert("");
            }

            for transition in block.transitions() {
                let value = transition.value();
                if value == WILDCARD || value == ERROR_VALUE || legal.contains(value) {
                    continue;
                }
                issues.push(
                    ValidationIssue::error(
                        IssueKind::UnrecognizedValue,
                        block.state(),
                        format!(
                            "'{}' never returns '{}' (state '{}')",
                            method,
                            value,
                            block.state()
                        ),
                        self.id(),
                    )
                    .with_value(value)
                    .at_line(transition.line()),
                );
            }

            if block.has_wildcard() {
                continue;
            }
            for value in legal {
                if block.transition(value).is_some() {
                    continue;
                }
                issues.push(
                    ValidationIssue::warning(
                        IssueKind::UnusedValue,
                        block.state(),
                        format!(
                            "'{}' may return '{}' but state '{}' does not handle it",
                            method,
                            value,
                            block.state()
                        ),
                        self.id(),
                    )
                    .with_value(value)
                    .at_line(block.line()),
                );
            }
        }

        issues
    }
}
