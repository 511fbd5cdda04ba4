//! Tests for recordings, transcripts and derived scripts

use super::*;
use chrono::Duration;

fn sample() -> Recording {
    let t0 = Utc::now();
    let mut rec = Recording::new();
    rec.mark_started(t0);
    rec.add_state_at("start", true, t0);
    rec.add_transition_at("start", "emptyTransition", "", None, TransitionOrigin::Selector, t0);
    rec.add_state_at("a", true, t0 + Duration::milliseconds(5));
    rec.add_transition_at(
        "a",
        "check",
        "!",
        Some("fail"),
        TransitionOrigin::Selector,
        t0 + Duration::milliseconds(1500),
    );
    rec.add_state_at("failure", true, t0 + Duration::milliseconds(1500));
    rec
}

#[test]
fn test_transcript_lines() {
    let transcript = sample().transcript();
    let lines: Vec<&str> = transcript.lines().collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "[+0.000s] STATE start");
    assert_eq!(lines[1], "[+0.000s] TRANSITION start:emptyTransition '' -> a");
    assert_eq!(
        lines[3],
        "[+1.500s] TRANSITION a:check ! -> failure (requested fail)"
    );
}

#[test]
fn test_not_executed_and_fallback_marked() {
    let mut rec = Recording::new();
    rec.add_transition("a", "check", "!", None, TransitionOrigin::Fallback);
    rec.add_state("failure", false);

    let transcript = rec.transcript();
    assert!(transcript.contains("[fallback]"));
    assert!(transcript.contains("STATE failure (not executed)"));
}

#[test]
fn test_diff_ignores_timestamps() {
    let rec = sample();
    let other = rec
        .transcript()
        .replace("[+1.500s]", "[+9.999s]")
        .replace("[+0.005s]", "[+0.100s]");
    assert_eq!(rec.diff(&other), "");
}

#[test]
fn test_diff_reports_changed_lines() {
    let rec = sample();
    let other = rec.transcript().replace("STATE failure", "STATE b");
    let diff = rec.diff(&other);

    assert!(diff.contains("+ STATE failure"));
    assert!(diff.contains("- STATE b"));
    assert_eq!(diff.lines().count(), 2);
}

#[test]
fn test_diff_handles_missing_tail() {
    let diff = diff_transcripts("STATE a\nSTATE b\n", "STATE a\n");
    assert_eq!(diff, "+ STATE b");
}

#[test]
fn test_simulation_script_uses_requested_values() {
    let script = sample().simulation_script();
    assert_eq!(script, "start {\n    ''\n}\na {\n    fail\n}\n");

    let parsed = crate::parser::parse_script(&script).unwrap();
    assert_eq!(parsed[1], ("a".to_string(), vec!["fail".to_string()]));
}

#[test]
fn test_verification_script() {
    let script = sample().verification_script();
    assert_eq!(script, "start ''\na fail\n");
    assert_eq!(crate::parser::parse_verify_script(&script).unwrap().len(), 2);
}

#[test]
fn test_fallback_transitions_not_in_scripts() {
    let mut rec = Recording::new();
    rec.add_state("a", true);
    rec.add_transition("a", "check", "!", None, TransitionOrigin::Fallback);
    rec.add_state("failure", true);

    assert_eq!(rec.simulation_script(), "");
    assert_eq!(rec.visited_states(), vec!["a", "failure"]);
}

#[test]
fn test_recording_serializes() {
    let rec = sample();
    let json = serde_json::to_string(&rec).unwrap();
    assert!(json.contains("\"kind\":\"transition\""));
    let back: Recording = serde_json::from_str(&json).unwrap();
    assert_eq!(back, rec);
}
