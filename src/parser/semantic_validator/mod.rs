//! Semantic Validation for State Tables
//!
//! Rule-based analysis that runs after parsing to catch problems the grammar
//! can't express: dangling targets, states that can never reach `finish`,
//! busy loops, and (given a handler catalog) mismatches between the table and
//! the handler code.
//!
//! # Usage
//!
//! ```ignore
//! use cadence_core::parser::{parse_state_table, semantic_validator::validate};
//!
//! let machine = parse_state_table(source)?;
//! let result = validate(&machine, Some(source), Some(&handler));
//! if result.has_failures() {
//!     eprintln!("{}", result);
//! }
//! ```
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **ValidationResult** - Issues grouped by kind, plus the value tables
//!
//! Structural rules always run. Reflective rules return nothing when no
//! catalog is supplied.
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `semantic_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;

use std::collections::{BTreeMap, BTreeSet};

use crate::executor::handler::HandlerCatalog;
use crate::model::StateMachine;

// ============================================================================
// Validation Issue Types
// ============================================================================

/// The category an issue is reported under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueKind {
    /// A referenced or required state has no block
    MissingBlock,
    /// No path from the state leads to `finish`
    NoPathToFinish,
    /// Self-transition without a wait
    SpinTransition,
    /// No handler for a state
    MissingStateMethod,
    /// No selector for a transition method
    MissingTransitionMethod,
    /// The table uses a value the selector never returns
    UnrecognizedValue,
    /// The selector may return a value the state does not handle
    UnusedValue,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::MissingBlock => "missing block",
            IssueKind::NoPathToFinish => "no path to finish",
            IssueKind::SpinTransition => "spin transition",
            IssueKind::MissingStateMethod => "missing state method",
            IssueKind::MissingTransitionMethod => "missing transition method",
            IssueKind::UnrecognizedValue => "unrecognized value",
            IssueKind::UnusedValue => "unused value",
        }
    }
}

/// Severity levels for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The task can misbehave at runtime
    Error,
    /// Probably unintended
    Warning,
}

/// One finding produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// State the issue is about (the missing state for `MissingBlock`)
    pub state: String,
    /// Offending value or method name, when there is one
    pub value: Option<String>,
    /// 1-based source line, when known
    pub line: Option<usize>,
    pub message: String,
    pub severity: Severity,
    /// Which rule produced this issue
    pub rule_id: &'static str,
}

impl ValidationIssue {
    pub fn error(
        kind: IssueKind,
        state: impl Into<String>,
        message: impl Into<String>,
        rule_id: &'static str,
    ) -> Self {
        Self {
            kind,
            state: state.into(),
            value: None,
            line: None,
            message: message.into(),
            severity: Severity::Error,
            rule_id,
        }
    }

    pub fn warning(
        kind: IssueKind,
        state: impl Into<String>,
        message: impl Into<String>,
        rule_id: &'static str,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, state, message, rule_id)
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.line {
            Some(line) => write!(
                f,
                "{} at line {}: {} [{}]",
                severity, line, self.message, self.rule_id
            ),
            None => write!(f, "{}: {} [{}]", severity, self.message, self.rule_id),
        }
    }
}

// ============================================================================
// Validation Result
// ============================================================================

/// Everything a validation run found. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
    /// state -> values its block declares
    used_values: BTreeMap<String, BTreeSet<String>>,
    /// method -> values the handler says it may return
    declared_values: BTreeMap<String, BTreeSet<String>>,
    source: Option<String>,
}

impl ValidationResult {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn of_kind(&self, kind: IssueKind) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.kind == kind).collect()
    }

    pub fn missing_blocks(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::MissingBlock)
    }

    pub fn no_path_to_finish(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::NoPathToFinish)
    }

    pub fn spin_transitions(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::SpinTransition)
    }

    pub fn missing_state_methods(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::MissingStateMethod)
    }

    pub fn missing_transition_methods(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::MissingTransitionMethod)
    }

    pub fn unrecognized_values(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::UnrecognizedValue)
    }

    pub fn unused_values(&self) -> Vec<&ValidationIssue> {
        self.of_kind(IssueKind::UnusedValue)
    }

    pub fn used_values(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.used_values
    }

    pub fn declared_values(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.declared_values
    }

    /// The table text the machine was compiled from, when supplied
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// True if any category is non-empty
    pub fn has_failures(&self) -> bool {
        !self.issues.is_empty()
    }

    /// True if any issue is error-severity
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.is_error())
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "no issues found");
        }
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// What a rule sees: the compiled machine and, optionally, the handler catalog.
#[derive(Clone, Copy)]
pub struct ValidationInput<'a> {
    pub machine: &'a StateMachine,
    pub catalog: Option<&'a dyn HandlerCatalog>,
}

/// Trait that all validation rules must implement.
///
/// Rules are independent of each other and must not depend on ordering.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "no-path-to-finish")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the rule. An empty vector means no issues found.
    fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                // Structural
                Box::new(rules::RequiredStatesRule),
                Box::new(rules::ReachabilityRule),
                Box::new(rules::SpinTransitionRule),
                // Reflective, no-ops without a catalog
                Box::new(rules::HandlerMethodsRule),
                Box::new(rules::TransitionValuesRule),
            ],
        }
    }

    pub fn validate(
        &self,
        machine: &StateMachine,
        source: Option<&str>,
        catalog: Option<&dyn HandlerCatalog>,
    ) -> ValidationResult {
        let input = ValidationInput { machine, catalog };
        let issues = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(&input))
            .collect();

        ValidationResult {
            issues,
            used_values: used_values(machine),
            declared_values: catalog.map(declared_values).unwrap_or_default(),
            source: source.map(str::to_string),
        }
    }

    /// Registered rules as `(id, description)`
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn used_values(machine: &StateMachine) -> BTreeMap<String, BTreeSet<String>> {
    machine
        .blocks()
        .iter()
        .map(|b| (b.state().to_string(), b.values().map(str::to_string).collect()))
        .collect()
}

/// Group the catalog's declared values by method
pub(crate) fn declared_values(catalog: &dyn HandlerCatalog) -> BTreeMap<String, BTreeSet<String>> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for declared in catalog.declared_values() {
        grouped.entry(declared.method).or_default().insert(declared.value);
    }
    grouped
}

// ============================================================================
// Public API
// ============================================================================

/// Validate a machine with all built-in rules.
pub fn validate(
    machine: &StateMachine,
    source: Option<&str>,
    catalog: Option<&dyn HandlerCatalog>,
) -> ValidationResult {
    Validator::new().validate(machine, source, catalog)
}

#[cfg(test)]
mod tests;
