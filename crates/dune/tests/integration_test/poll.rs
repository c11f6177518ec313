//! Tests for the status polling loop under paused tokio time.

use std::time::Duration;

use dunefetch_dune::{wait_for_completion, DuneError, ExecutionHandle, ExecutionState, PollPolicy};
use serde_json::json;

use crate::support::ScriptedApi;

fn handle() -> ExecutionHandle {
    ExecutionHandle::new("01HTESTEXECUTION")
}

#[tokio::test(start_paused = true)]
async fn test_stops_at_first_terminal_state() {
    let api = ScriptedApi::new(
        vec![
            ExecutionState::Executing,
            ExecutionState::Executing,
            ExecutionState::Completed,
        ],
        json!({}),
    );

    let report = wait_for_completion(&api, &handle(), &PollPolicy::fixed(Duration::from_secs(10)))
        .await
        .unwrap();

    assert_eq!(report.status.state, ExecutionState::Completed);
    assert_eq!(report.attempts, 3);
    assert_eq!(api.status_calls(), 3);
    assert_eq!(api.results_calls(), 0);
    // Two fixed waits between the three checks.
    assert_eq!(report.elapsed, Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_returned_not_raised() {
    let api = ScriptedApi::new(
        vec![ExecutionState::Pending, ExecutionState::Failed],
        json!({}),
    );

    let report = wait_for_completion(&api, &handle(), &PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(report.status.state, ExecutionState::Failed);
    assert_eq!(report.attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_on_first_check_does_not_sleep() {
    let api = ScriptedApi::new(vec![ExecutionState::Completed], json!({}));

    let report = wait_for_completion(&api, &handle(), &PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(report.elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_states_keep_polling() {
    let api = ScriptedApi::new(
        vec![
            ExecutionState::Other("QUERY_STATE_SOMETHING_NEW".into()),
            ExecutionState::Completed,
        ],
        json!({}),
    );

    let report = wait_for_completion(&api, &handle(), &PollPolicy::default())
        .await
        .unwrap();
    assert_eq!(report.attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_grow() {
    let api = ScriptedApi::new(
        vec![
            ExecutionState::Executing,
            ExecutionState::Executing,
            ExecutionState::Executing,
            ExecutionState::Completed,
        ],
        json!({}),
    );
    let policy = PollPolicy {
        interval: Duration::from_secs(10),
        backoff_factor: 2.0,
        max_interval: Duration::from_secs(30),
        max_attempts: None,
        timeout: None,
    };

    let report = wait_for_completion(&api, &handle(), &policy).await.unwrap();

    // 10 + 20 + 30 (capped)
    assert_eq!(report.elapsed, Duration::from_secs(60));
    assert_eq!(report.attempts, 4);
}

#[tokio::test(start_paused = true)]
async fn test_max_attempts_gives_up() {
    let api = ScriptedApi::new(vec![ExecutionState::Executing], json!({}));
    let policy = PollPolicy {
        max_attempts: Some(3),
        ..PollPolicy::fixed(Duration::from_secs(10))
    };

    let err = wait_for_completion(&api, &handle(), &policy)
        .await
        .unwrap_err();

    match err {
        DuneError::PollTimeout {
            execution_id,
            attempts,
            ..
        } => {
            assert_eq!(execution_id, "01HTESTEXECUTION");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected PollTimeout, got: {other:?}"),
    }
    assert_eq!(api.status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_gives_up_before_oversleeping() {
    let api = ScriptedApi::new(vec![ExecutionState::Executing], json!({}));
    let policy = PollPolicy {
        timeout: Some(Duration::from_secs(35)),
        ..PollPolicy::fixed(Duration::from_secs(10))
    };

    let err = wait_for_completion(&api, &handle(), &policy)
        .await
        .unwrap_err();

    // Checks at t=0,10,20,30; the next wait would end past the deadline.
    assert!(matches!(err, DuneError::PollTimeout { attempts: 4, .. }));
    assert_eq!(api.status_calls(), 4);
}
