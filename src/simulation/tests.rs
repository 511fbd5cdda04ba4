//! Tests for the simulation interpreters

use super::*;
use crate::executor::HandlerRegistry;
use crate::model::StateMachine;

fn machine() -> StateMachine {
    StateMachine::compile(
        r#"
start {
    '*' poll
}
poll:check {
    pending poll wait=30
    done    finish
    '!'     failure
}
"#,
    )
    .unwrap()
}

/* ===================== Script ===================== */

#[test]
fn test_script_sticks_on_last_value() {
    let mut script = ScriptInterpreter::parse("poll { pending done }").unwrap();
    assert_eq!(script.next_value("poll", "check").unwrap(), "pending");
    assert_eq!(script.next_value("poll", "check").unwrap(), "done");
    assert_eq!(script.next_value("poll", "check").unwrap(), "done");

    script.reset();
    assert_eq!(script.next_value("poll", "check").unwrap(), "pending");
}

#[test]
fn test_script_cursors_are_per_state() {
    let mut script = ScriptInterpreter::parse("a { one two }\nb { three }\na { four }").unwrap();
    assert_eq!(script.next_value("a", "m").unwrap(), "one");
    assert_eq!(script.next_value("b", "m").unwrap(), "three");
    assert_eq!(script.next_value("a", "m").unwrap(), "two");
    assert_eq!(script.next_value("a", "m").unwrap(), "four");
}

#[test]
fn test_script_unknown_and_empty_states() {
    let mut script = ScriptInterpreter::parse("a { }").unwrap();
    assert_eq!(
        script.next_value("a", "m").unwrap_err(),
        SimulationError::NoValues {
            state: "a".to_string()
        }
    );
    assert!(matches!(
        script.next_value("zzz", "m").unwrap_err(),
        SimulationError::UnknownState { .. }
    ));
}

#[test]
fn test_script_parse_error_surfaces() {
    let err = ScriptInterpreter::parse("a { 'unterminated }").unwrap_err();
    assert!(matches!(err, SimulationError::Parse(_)));
}

/* ===================== Verify ===================== */

#[test]
fn test_verify_in_order() {
    let mut verify = VerifyInterpreter::parse("start ''\npoll done\n").unwrap();
    assert_eq!(verify.next_value("start", "emptyTransition").unwrap(), "");
    assert!(!verify.is_finished());
    assert_eq!(verify.next_value("poll", "check").unwrap(), "done");
    assert!(verify.is_finished());

    assert!(matches!(
        verify.next_value("poll", "check").unwrap_err(),
        SimulationError::Exhausted { .. }
    ));
}

#[test]
fn test_verify_mismatch_reports_position() {
    let mut verify = VerifyInterpreter::parse("start ''\npoll done\n").unwrap();
    verify.next_value("start", "emptyTransition").unwrap();
    assert_eq!(
        verify.next_value("failure", "emptyTransition").unwrap_err(),
        SimulationError::Mismatch {
            position: 2,
            expected: "poll".to_string(),
            actual: "failure".to_string(),
        }
    );
}

/* ===================== Random ===================== */

#[test]
fn test_random_uses_table_values_without_catalog() {
    let mut random = RandomInterpreter::new(&machine(), None)
        .with_seed(42)
        .with_failure_probability(0.0)
        .unwrap();

    for _ in 0..50 {
        let value = random.next_value("poll", "check").unwrap();
        assert!(value == "pending" || value == "done", "unexpected {}", value);
    }
    assert_eq!(random.next_value("start", "emptyTransition").unwrap(), "");
}

#[test]
fn test_random_prefers_declared_values() {
    let catalog = HandlerRegistry::new(())
        .transition("check", &[("queued", "waiting in line")], |_, _| Ok("queued".to_string()));
    let mut random = RandomInterpreter::new(&machine(), Some(&catalog))
        .with_seed(1)
        .with_failure_probability(0.0)
        .unwrap();

    for _ in 0..10 {
        assert_eq!(random.next_value("poll", "check").unwrap(), "queued");
    }
}

#[test]
fn test_random_failure_probability() {
    let mut random = RandomInterpreter::new(&machine(), None)
        .with_seed(3)
        .with_failure_probability(1.0)
        .unwrap();
    assert_eq!(random.next_value("poll", "check").unwrap(), "!");
    assert_eq!(random.next_value("start", "emptyTransition").unwrap(), "!");

    assert!(matches!(
        RandomInterpreter::new(&machine(), None).with_failure_probability(1.5),
        Err(SimulationError::InvalidProbability(_))
    ));
}

#[test]
fn test_random_seed_is_repeatable() {
    let draw = |seed: u64| {
        let mut random = RandomInterpreter::new(&machine(), None).with_seed(seed);
        (0..30)
            .map(|_| random.next_value("poll", "check").unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(draw(9), draw(9));

    let mut random = RandomInterpreter::new(&machine(), None).with_seed(9);
    let first: Vec<String> = (0..5).map(|_| random.next_value("poll", "check").unwrap()).collect();
    random.reset();
    let again: Vec<String> = (0..5).map(|_| random.next_value("poll", "check").unwrap()).collect();
    assert_eq!(first, again);
    assert_eq!(random.seed(), 9);
}

#[test]
fn test_random_unknown_state() {
    let mut random = RandomInterpreter::new(&machine(), None)
        .with_failure_probability(0.0)
        .unwrap();
    assert!(matches!(
        random.next_value("ghost", "check").unwrap_err(),
        SimulationError::UnknownState { .. }
    ));
}
