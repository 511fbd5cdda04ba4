//! Tests for the semantic validation system

use super::*;
use crate::executor::HandlerRegistry;

// ============================================================================
// Helper Functions
// ============================================================================

const TABLE: &str = r#"
start {
    '*' poll
}
poll:check {
    pending poll wait=30
    done    finish
    '!'     failure
}
failure {
    '*' finish
}
terminate {
    '*' finish
}
"#;

fn check(source: &str) -> ValidationResult {
    let machine = StateMachine::compile(source).expect("Parse should succeed");
    validate(&machine, Some(source), None)
}

fn check_with(source: &str, catalog: &dyn HandlerCatalog) -> ValidationResult {
    let machine = StateMachine::compile(source).expect("Parse should succeed");
    validate(&machine, Some(source), Some(catalog))
}

/// Catalog covering every state and selector in `TABLE`
fn full_catalog() -> HandlerRegistry<()> {
    HandlerRegistry::new(())
        .state("start", |_, _| Ok(()))
        .state("poll", |_, _| Ok(()))
        .transition(
            "check",
            &[("pending", "job still running"), ("done", "job finished")],
            |_, _| Ok("done".to_string()),
        )
}

fn states(issues: &[&ValidationIssue]) -> Vec<String> {
    issues.iter().map(|i| i.state.clone()).collect()
}

// ============================================================================
// Structural Rules
// ============================================================================

#[test]
fn test_clean_table_has_no_issues() {
    let result = check(TABLE);
    assert!(!result.has_failures(), "{}", result);
    assert_eq!(result.to_string(), "no issues found\n");
}

#[test]
fn test_required_states_missing() {
    let result = check("start {\n    '*' finish\n}\n");

    let missing = result.missing_blocks();
    assert_eq!(states(&missing), vec!["failure", "terminate"]);
    assert!(missing.iter().all(|i| i.rule_id == "required-states"));
    assert!(result.has_errors());
}

#[test]
fn test_required_state_targets_not_reported_twice() {
    let source = r#"
start {
    ok  finish
    '!' failure
}
terminate {
    '*' finish
}
"#;
    let result = check(source);
    let missing = result.missing_blocks();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].state, "failure");
    assert_eq!(missing[0].rule_id, "required-states");
}

#[test]
fn test_dangling_target() {
    let source = TABLE.replace("done    finish", "done    cleanup");
    let result = check(&source);

    let missing = result.missing_blocks();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].state, "cleanup");
    assert_eq!(missing[0].value.as_deref(), Some("done"));
    assert_eq!(missing[0].line, Some(7));
    assert_eq!(missing[0].rule_id, "reachability");
}

#[test]
fn test_dangling_target_reported_once() {
    let source = r#"
start {
    a  cleanup
    b  cleanup
    ok finish
}
failure {
    '*' finish
}
terminate {
    '*' finish
}
"#;
    let result = check(source);
    assert_eq!(states(&result.missing_blocks()), vec!["cleanup"]);
    assert!(result.no_path_to_finish().is_empty());
}

#[test]
fn test_loop_without_exit() {
    let source = r#"
start {
    ok  b
}
b {
    '*' start
}
failure {
    '*' finish
}
terminate {
    '*' finish
}
"#;
    let result = check(source);
    let stuck = result.no_path_to_finish();
    assert_eq!(states(&stuck), vec!["start", "b"]);
    assert_eq!(stuck[0].line, Some(2));
}

#[test]
fn test_loop_with_exit_is_fine() {
    let source = r#"
start {
    ok   b
}
b {
    back start wait=5
    done finish
}
failure {
    '*' finish
}
terminate {
    '*' finish
}
"#;
    assert!(check(source).no_path_to_finish().is_empty());
}

#[test]
fn test_dense_group_without_exit() {
    // Every state links to every other one and none reaches finish
    let n = 12;
    let mut source = String::from("start {\n    go s0\n}\n");
    for i in 0..n {
        source.push_str(&format!("s{}:pick {{\n", i));
        for j in (0..n).filter(|j| *j != i) {
            source.push_str(&format!("    v{} s{} wait=1\n", j, j));
        }
        source.push_str("}\n");
    }
    source.push_str("failure {\n    '*' finish\n}\nterminate {\n    '*' finish\n}\n");

    let started = std::time::Instant::now();
    let result = check(&source);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));

    let stuck = result.no_path_to_finish();
    assert_eq!(stuck.len(), n + 1);
    assert_eq!(stuck[0].state, "start");
    assert!(result.missing_blocks().is_empty());
}

#[test]
fn test_dead_end_through_missing_block() {
    let source = TABLE
        .replace("done    finish", "done    cleanup")
        .replace("'!'     failure", "");
    let result = check(&source);
    assert_eq!(states(&result.no_path_to_finish()), vec!["start", "poll"]);
}

#[test]
fn test_spin_transition_is_warning() {
    let source = TABLE.replace("pending poll wait=30", "pending poll");
    let result = check(&source);

    let spins = result.spin_transitions();
    assert_eq!(spins.len(), 1);
    assert_eq!(spins[0].state, "poll");
    assert_eq!(spins[0].value.as_deref(), Some("pending"));
    assert_eq!(spins[0].line, Some(6));
    assert_eq!(spins[0].severity, Severity::Warning);

    assert!(result.has_failures());
    assert!(!result.has_errors());
}

// ============================================================================
// Reflective Rules
// ============================================================================

#[test]
fn test_reflective_rules_skip_without_catalog() {
    let result = check(TABLE);
    assert!(result.missing_state_methods().is_empty());
    assert!(result.missing_transition_methods().is_empty());
    assert!(result.declared_values().is_empty());
}

#[test]
fn test_full_catalog_is_clean() {
    let result = check_with(TABLE, &full_catalog());
    assert!(!result.has_failures(), "{}", result);
}

#[test]
fn test_missing_handler_methods() {
    let catalog = HandlerRegistry::new(()).state("poll", |_, _| Ok(()));
    let result = check_with(TABLE, &catalog);

    let states_missing = result.missing_state_methods();
    assert_eq!(states(&states_missing), vec!["start"]);
    assert_eq!(states_missing[0].line, Some(2));

    let selectors = result.missing_transition_methods();
    assert_eq!(selectors.len(), 1);
    assert_eq!(selectors[0].value.as_deref(), Some("check"));
    assert_eq!(selectors[0].state, "poll");

    // No value checks for a block whose selector is missing
    assert!(result.unrecognized_values().is_empty());
    assert!(result.unused_values().is_empty());
}

#[test]
fn test_unrecognized_value() {
    let source = TABLE.replace("done    finish", "done    finish\n    oops    failure");
    let result = check_with(&source, &full_catalog());

    let unrecognized = result.unrecognized_values();
    assert_eq!(unrecognized.len(), 1);
    assert_eq!(unrecognized[0].value.as_deref(), Some("oops"));
    assert_eq!(unrecognized[0].line, Some(8));
    assert!(unrecognized[0].is_error());
}

#[test]
fn test_unused_value() {
    let catalog = full_catalog().transition(
        "check",
        &[("pending", ""), ("done", ""), ("queued", "waiting for a worker")],
        |_, _| Ok("queued".to_string()),
    );
    let result = check_with(TABLE, &catalog);
    assert!(result.unrecognized_values().is_empty());

    let unused = result.unused_values();
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].value.as_deref(), Some("queued"));
    assert_eq!(unused[0].line, Some(5));
    assert_eq!(unused[0].severity, Severity::Warning);
}

#[test]
fn test_wildcard_block_has_no_unused_values() {
    let source = TABLE.replace("'!'     failure", "'*'     failure");
    let catalog = full_catalog().transition(
        "check",
        &[("pending", ""), ("done", ""), ("queued", "")],
        |_, _| Ok("queued".to_string()),
    );
    let result = check_with(&source, &catalog);
    assert!(result.unused_values().is_empty());
}

#[test]
fn test_empty_transition_values() {
    let source = r#"
start {
    ''  finish
    go  finish
}
failure {
    '*' finish
}
terminate {
    '*' finish
}
"#;
    let catalog = HandlerRegistry::new(()).state("start", |_, _| Ok(()));
    let result = check_with(source, &catalog);

    let unrecognized = result.unrecognized_values();
    assert_eq!(unrecognized.len(), 1);
    assert_eq!(unrecognized[0].value.as_deref(), Some("go"));
    assert!(result.unused_values().is_empty());
    assert!(result.missing_transition_methods().is_empty());
}

// ============================================================================
// Result Tables and Formatting
// ============================================================================

#[test]
fn test_value_tables() {
    let result = check_with(TABLE, &full_catalog());

    let used = result.used_values();
    assert_eq!(
        used["poll"].iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["!", "done", "pending"]
    );
    assert!(used["start"].contains("*"));

    let declared = result.declared_values();
    assert_eq!(declared.len(), 1);
    assert!(declared["check"].contains("pending"));
    assert_eq!(result.source(), Some(TABLE));
}

#[test]
fn test_issue_display() {
    let issue = ValidationIssue::error(IssueKind::MissingBlock, "x", "state 'x' is gone", "reachability")
        .at_line(4);
    assert_eq!(issue.to_string(), "error at line 4: state 'x' is gone [reachability]");

    let issue = ValidationIssue::warning(IssueKind::UnusedValue, "x", "unused", "transition-values");
    assert_eq!(issue.to_string(), "warning: unused [transition-values]");
    assert_eq!(IssueKind::NoPathToFinish.label(), "no path to finish");
}

#[test]
fn test_registered_rules() {
    let ids: Vec<&str> = Validator::new().rules().map(|(id, _)| id).collect();
    assert_eq!(
        ids,
        vec![
            "required-states",
            "reachability",
            "spin-transition",
            "handler-methods",
            "transition-values"
        ]
    );
}
