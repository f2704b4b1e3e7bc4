//! Session lifecycle scenarios driven by a scripted engine
//!
//! All tests run on a paused tokio clock: poll intervals elapse instantly
//! and deterministically whenever the runtime is otherwise idle.

mod common;

use common::{
    assert_monotonic, collect_events, controller_for, unreachable, ScriptedEngine, POLL_INTERVAL,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;
use websecscan::engine::{EngineError, EnginePhase, EngineSessionHandle, EngineStatus};
use websecscan::session::{ErrorKind, ScanRequest, SessionError, SessionState};

const TARGET: &str = "https://example.org";

#[tokio::test(start_paused = true)]
async fn test_passive_scan_without_engine_progress() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then_repeat(Ok(EngineStatus::running(None)), 60)
            .then(Ok(EngineStatus::succeeded())),
    );
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    let events = collect_events(events).await;
    assert_monotonic(&events);

    let (terminal, live) = events.split_last().unwrap();
    assert_eq!(live[0].state, SessionState::Starting);
    let running: Vec<_> = live
        .iter()
        .filter(|e| e.state == SessionState::Running)
        .collect();
    assert_eq!(running.len(), 61);
    assert!(running.iter().all(|e| e.progress_percent < 100.0));

    // Half of the 120s expected duration has passed at the last running tick
    let last = running.last().unwrap();
    assert!((last.progress_percent - 50.0).abs() < 1.0, "{}", last.progress_percent);
    assert!((59..=61).contains(&last.remaining_seconds));

    assert_eq!(terminal.state, SessionState::Completed);
    assert_eq!(terminal.progress_percent, 100.0);
    assert_eq!(terminal.remaining_seconds, 0);
    assert!(terminal.result.is_some());
    assert_eq!(controller.state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_intrusive_profile_requires_authorization() {
    let engine = Arc::new(ScriptedEngine::new());
    let controller = controller_for(&engine);

    for profile in ["active", "spider", "ACTIVE"] {
        let err = controller
            .start(ScanRequest::new(TARGET, profile))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationRequired);
    }

    assert_eq!(engine.total_calls(), 0);
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(controller.session().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_non_intrusive_profile_ignores_authorization_flag() {
    for granted in [false, true] {
        let engine = Arc::new(ScriptedEngine::new().then(Ok(EngineStatus::succeeded())));
        let controller = controller_for(&engine);

        let events = controller
            .start(ScanRequest::new(TARGET, "passive").with_authorization(granted))
            .await
            .unwrap();
        let terminal = events.wait_for_terminal().await.unwrap();
        assert_eq!(terminal.state, SessionState::Completed);
        assert_eq!(engine.start_calls(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_engine_fails_only_after_ceiling() {
    let engine = Arc::new(ScriptedEngine::new().otherwise(Err(unreachable())));
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();

    // Three consecutive faults are tolerated
    tokio::time::sleep(POLL_INTERVAL * 3 + Duration::from_millis(500)).await;
    assert_eq!(engine.poll_calls(), 3);
    assert_eq!(controller.state(), SessionState::Running);

    let terminal = events.wait_for_terminal().await.unwrap();
    assert_eq!(engine.poll_calls(), 4);
    assert_eq!(terminal.state, SessionState::Failed);
    let error = terminal.error.unwrap();
    assert_eq!(error.kind, ErrorKind::EngineUnreachable);
    assert!(error.detail.contains("connection refused"));
    assert!(error.detail.contains("4 consecutive failures"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_faults_reset_after_success() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then_repeat(Err(unreachable()), 3)
            .then(Ok(EngineStatus::running(Some(40.0))))
            .then_repeat(Err(unreachable()), 3)
            .then(Ok(EngineStatus::succeeded())),
    );
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    let events = collect_events(events).await;

    let terminal = events.last().unwrap();
    assert_eq!(terminal.state, SessionState::Completed);
    assert_eq!(engine.poll_calls(), 8);
    assert!(events.iter().any(|e| e.progress_percent == 40.0));
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_running_within_one_interval() {
    let engine = Arc::new(ScriptedEngine::new());
    let controller = controller_for(&engine);

    let mut events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    tokio::time::sleep(POLL_INTERVAL * 5 + Duration::from_millis(200)).await;
    assert_eq!(controller.state(), SessionState::Running);

    let requested_at = tokio::time::Instant::now();
    let final_state = controller.stop().await.unwrap();
    assert!(requested_at.elapsed() <= POLL_INTERVAL);

    assert_eq!(final_state, SessionState::Stopped);
    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(engine.stop_calls(), 1);

    let mut terminal = None;
    while let Some(event) = events.next().await {
        terminal = Some(event);
    }
    let terminal = terminal.unwrap();
    assert_eq!(terminal.state, SessionState::Stopped);
    assert_eq!(terminal.reason.as_deref(), Some("stopped by operator"));
    assert!(terminal.progress_percent < 100.0);

    // Stopping again is an acknowledgement only
    assert_eq!(controller.stop().await.unwrap(), SessionState::Stopped);
    assert_eq!(engine.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_engine_stop_failure_still_stops_locally() {
    let engine = Arc::new(ScriptedEngine::new().failing_stop(unreachable()));
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    assert_eq!(controller.stop().await.unwrap(), SessionState::Stopped);

    let terminal = events.wait_for_terminal().await.unwrap();
    let reason = terminal.reason.unwrap();
    assert!(reason.starts_with("stopped by operator"));
    assert!(reason.contains("engine stop failed"));
}

#[tokio::test(start_paused = true)]
async fn test_completion_wins_over_concurrent_stop() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(
        ScriptedEngine::new().then_held(Arc::clone(&gate), Ok(EngineStatus::succeeded())),
    );
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    while engine.poll_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // The poll reporting completion is in flight when the stop arrives
    assert!(controller.request_stop().unwrap());
    gate.notify_one();

    assert_eq!(controller.stop().await.unwrap(), SessionState::Completed);
    assert_eq!(engine.stop_calls(), 0);

    let events = collect_events(events).await;
    let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].state, SessionState::Completed);
    assert_eq!(terminals[0].progress_percent, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_engine_progress_regression_is_clamped() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(Ok(EngineStatus::running(Some(30.0))))
            .then(Ok(EngineStatus::running(Some(10.0))))
            .then(Ok(EngineStatus::running(Some(45.0))))
            .then(Ok(EngineStatus::succeeded())),
    );
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    let events = collect_events(events).await;
    assert_monotonic(&events);

    let progress: Vec<f64> = events.iter().map(|e| e.progress_percent).collect();
    assert_eq!(progress, vec![0.0, 0.0, 30.0, 30.0, 45.0, 100.0]);
}

#[tokio::test(start_paused = true)]
async fn test_engine_reported_completion_via_progress() {
    let engine = Arc::new(ScriptedEngine::new().then(Ok(EngineStatus::running(Some(100.0)))));
    let controller = controller_for(&engine);

    let terminal = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap()
        .wait_for_terminal()
        .await
        .unwrap();
    assert_eq!(terminal.state, SessionState::Completed);
    assert_eq!(terminal.progress_percent, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_engine_failure_status_fails_session() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(Ok(EngineStatus::running(Some(20.0))))
            .then(Ok(EngineStatus::failed("scan policy missing"))),
    );
    let controller = controller_for(&engine);

    let terminal = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap()
        .wait_for_terminal()
        .await
        .unwrap();
    assert_eq!(terminal.state, SessionState::Failed);
    assert_eq!(terminal.progress_percent, 20.0);
    let error = terminal.error.unwrap();
    assert_eq!(error.kind, ErrorKind::EngineRejected);
    assert_eq!(error.detail, "scan policy missing");
}

#[tokio::test(start_paused = true)]
async fn test_lost_session_fails_without_retry() {
    let engine = Arc::new(ScriptedEngine::new().then(Err(EngineError::SessionNotFound {
        engine_id: "1".to_string(),
    })));
    let controller = controller_for(&engine);

    let terminal = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap()
        .wait_for_terminal()
        .await
        .unwrap();
    assert_eq!(terminal.error.unwrap().kind, ErrorKind::SessionNotFound);
    assert_eq!(engine.poll_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_engine_start_failure_is_reported_on_stream() {
    let engine = Arc::new(ScriptedEngine::new().failing_start(unreachable()));
    let controller = controller_for(&engine);

    let events = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    let events = collect_events(events).await;

    let states: Vec<_> = events.iter().map(|e| e.state).collect();
    assert_eq!(states, vec![SessionState::Starting, SessionState::Failed]);
    assert_eq!(
        events[1].error.as_ref().unwrap().kind,
        ErrorKind::EngineUnreachable
    );
    assert_eq!(engine.poll_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_continuation_handle_replaces_engine_session() {
    let target = Url::parse(TARGET).unwrap();
    let next = EngineSessionHandle::new("9", EnginePhase::ActiveAfterSpider, &target);
    let engine = Arc::new(
        ScriptedEngine::new()
            .then(Ok(EngineStatus::running(Some(25.0))))
            .then(Ok(EngineStatus::running(Some(50.0)).with_continuation(next)))
            .then(Ok(EngineStatus::running(Some(75.0))))
            .then(Ok(EngineStatus::succeeded())),
    );
    let controller = controller_for(&engine);

    let terminal = controller
        .start(ScanRequest::new(TARGET, "spider").with_authorization(true))
        .await
        .unwrap()
        .wait_for_terminal()
        .await
        .unwrap();

    assert_eq!(terminal.state, SessionState::Completed);
    assert_eq!(engine.polled_engine_ids(), vec!["1", "1", "9", "9"]);
    assert_eq!(terminal.result.unwrap().engine_id, "9");
}

#[tokio::test(start_paused = true)]
async fn test_second_start_rejected_until_reset() {
    let engine = Arc::new(ScriptedEngine::new());
    let controller = controller_for(&engine);

    controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    let err = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SessionAlreadyActive { .. }));

    controller.stop().await.unwrap();
    let err = controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::SessionAlreadyActive {
            state: SessionState::Stopped
        }
    );

    controller.reset().unwrap();
    controller
        .start(ScanRequest::new(TARGET, "passive"))
        .await
        .unwrap();
    assert_eq!(engine.start_calls(), 2);
    controller.stop().await.unwrap();
}
