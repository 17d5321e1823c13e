//! Tests for the exit-code policy and outcome reporting.
//!
//! The historical behavior is "always exit 0 once the completion handler
//! fires"; these tests pin that down as the default policy and verify the
//! opt-in strict policy.

use sonar_invoke::cli::{exit_code_for, exit_code_for_error, EXIT_ERROR, EXIT_FAILED, EXIT_SUCCESS};
use sonar_invoke::{JsonReport, ScanOutcome, TaskStatus};

fn outcome(status: TaskStatus, error_message: Option<&str>) -> ScanOutcome {
    ScanOutcome {
        task_id: "AYxTask1".to_string(),
        status,
        error_message: error_message.map(String::from),
    }
}

#[test]
fn default_policy_swallows_failures() {
    let failed = outcome(TaskStatus::Failed, Some("analysis error"));
    assert_eq!(exit_code_for(&failed, false), EXIT_SUCCESS);

    let canceled = outcome(TaskStatus::Canceled, None);
    assert_eq!(exit_code_for(&canceled, false), EXIT_SUCCESS);
}

#[test]
fn strict_policy_surfaces_failures() {
    let failed = outcome(TaskStatus::Failed, Some("analysis error"));
    assert_eq!(exit_code_for(&failed, true), EXIT_FAILED);

    let ok = outcome(TaskStatus::Success, None);
    assert_eq!(exit_code_for(&ok, true), EXIT_SUCCESS);
}

#[test]
fn default_policy_swallows_client_errors_too() {
    // A scan that never completes (unreachable server, rejected auth,
    // poll timeout after submission) still exits 0 by default.
    assert_eq!(exit_code_for_error(false), EXIT_SUCCESS);
}

#[test]
fn strict_policy_surfaces_client_errors() {
    assert_eq!(exit_code_for_error(true), EXIT_ERROR);
}

#[test]
fn json_report_carries_outcome_through() {
    let failed = outcome(TaskStatus::Failed, Some("quality profile missing"));
    let report = JsonReport::new("http://localhost:9000", "backend", &failed);
    let json = serde_json::to_string(&report).unwrap();

    let parsed: JsonReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.status, "FAILED");
    assert!(!parsed.passed);
    assert_eq!(parsed.task_id, "AYxTask1");
    assert_eq!(parsed.error_message.as_deref(), Some("quality profile missing"));
}
