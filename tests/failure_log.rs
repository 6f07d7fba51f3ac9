// tests/failure_log.rs

use jobrunner::exec::FailureLog;
use jobrunner::{FailureKind, JobError};

#[test]
fn empty_log_is_ok() {
    assert!(FailureLog::new().to_result().is_ok());
}

#[test]
fn single_failure_is_returned_unchanged() {
    let mut log = FailureLog::new();
    log.record("deadman", JobError::Timeout("too slow".to_string()));

    let err = log.to_result().unwrap_err();
    assert!(matches!(err, JobError::Timeout(ref msg) if msg == "too slow"));
}

#[test]
fn several_failures_become_a_composite() {
    let mut log = FailureLog::new();
    log.record("deadman", JobError::Timeout("too slow".to_string()));
    log.record("escalator", JobError::UnableToKill("signals SIGTERM failed".to_string()));
    log.record("stdin writer", JobError::Execution("late failure".to_string()));

    let err = log.to_result().unwrap_err();
    // Unable-to-kill wins over the most recent failure.
    assert_eq!(err.kind(), FailureKind::UnableToKill);

    let text = err.to_string();
    let timeout_at = text.find("TimeoutError: too slow").expect("timeout listed");
    let kill_at = text
        .find("UnableToKillJob: signals SIGTERM failed")
        .expect("kill failure listed");
    let late_at = text.find("ExecuteError: late failure").expect("last failure listed");
    assert!(timeout_at < kill_at && kill_at < late_at, "order kept: {text}");
    assert!(text.contains(&"-".repeat(50)));
    assert!(text.contains("failure_log.rs"), "records where each failure came from");
}

#[test]
fn composite_kind_falls_back_to_the_last_failure() {
    let mut log = FailureLog::new();
    log.record("deadman", JobError::Timeout("too slow".to_string()));
    log.record("password injector", JobError::FailedPassword("rejected".to_string()));

    assert_eq!(log.len(), 2);
    let err = log.to_result().unwrap_err();
    assert_eq!(err.kind(), FailureKind::FailedPassword);
}
