//! Integration tests for the full-screen exit confirmation flow.

mod common;

use common::{Harness, advance, passed_check, spawn_session};
use interview_guard_core::{TerminationReason, ViolationKind};
use interview_guard_fullscreen::{FullscreenHost, Key};
use interview_guard_session::{SessionConfig, SessionError, SessionPhase};
use interview_guard_ui::{Dialog, StageStatus};

#[tokio::test(start_paused = true)]
async fn fullscreen_confirmation_tests_exit_cancel_then_confirm() {
    let harness = Harness::new();
    let stats = harness.devices.stats();
    let (session, handle) = harness.attentive_session(SessionConfig::default());
    let running = spawn_session(session, passed_check());

    advance(100).await;
    assert!(harness.host.is_fullscreen());

    harness.host.leave();
    handle.fullscreen_changed(false).expect("signal");
    advance(100).await;

    let paused = handle.snapshot();
    assert_eq!(paused.phase, SessionPhase::PausedForConfirmation);
    assert_eq!(paused.state.warning_count, 1);
    assert_eq!(paused.view.current_dialog(), Some(&Dialog::ExitConfirmation));

    handle.cancel_exit().expect("cancel");
    advance(100).await;

    let resumed = handle.snapshot();
    assert_eq!(resumed.phase, SessionPhase::Active);
    assert!(harness.host.is_fullscreen());
    assert_eq!(harness.host.requests(), 2);
    assert!(matches!(
        resumed.view.current_dialog(),
        Some(Dialog::Warning {
            kind: ViolationKind::FullscreenExit,
            ..
        })
    ));

    handle.request_end().expect("request end");
    advance(100).await;
    handle.confirm_exit().expect("confirm");
    let (summary, _) = running.await.expect("session task should join");

    assert_eq!(
        summary.state.termination_reason,
        Some(TerminationReason::ManualExit)
    );
    assert_eq!(stats.released(), 1);
    assert_eq!(stats.outstanding(), 0);
    assert!(!harness.host.is_fullscreen());
    assert!(summary.recording.is_some());
}

#[tokio::test(start_paused = true)]
async fn fullscreen_confirmation_tests_blocked_key_pauses_without_violation() {
    let harness = Harness::new();
    let (session, handle) = harness.attentive_session(SessionConfig::default());
    let running = spawn_session(session, passed_check());

    advance(100).await;
    assert!(handle.key_pressed(Key::Escape).expect("key"));
    assert!(!handle.key_pressed(Key::Other).expect("key"));
    advance(100).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::PausedForConfirmation);
    assert_eq!(snapshot.state.warning_count, 0);

    handle.confirm_exit().expect("confirm");
    let (summary, _) = running.await.expect("session task should join");
    assert_eq!(
        summary.state.termination_reason,
        Some(TerminationReason::ManualExit)
    );

    assert!(matches!(
        handle.key_pressed(Key::Escape),
        Err(SessionError::ChannelClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn fullscreen_confirmation_tests_countdown_display_freezes_while_paused() {
    let harness = Harness::new();
    let config = SessionConfig {
        session_length_secs: 120,
        ..SessionConfig::default()
    };
    let (session, handle) = harness.attentive_session(config);
    let running = spawn_session(session, passed_check());

    advance(2_500).await;
    assert_eq!(handle.snapshot().view.countdown, "01:58");

    handle.request_end().expect("request end");
    advance(3_000).await;

    let paused = handle.snapshot();
    assert!(paused.view.is_countdown_frozen());
    assert_eq!(paused.view.countdown, "01:58");
    assert_eq!(paused.state.remaining_seconds, 115);

    handle.cancel_exit().expect("cancel");
    advance(10).await;
    assert_eq!(handle.snapshot().view.countdown, "01:55");

    handle.request_end().expect("request end");
    handle.confirm_exit().expect("confirm");
    running.await.expect("session task should join");
}

#[tokio::test(start_paused = true)]
async fn fullscreen_confirmation_tests_refused_fullscreen_degrades() {
    let harness = Harness::new();
    harness.host.refuse_requests(true);
    let (session, handle) = harness.attentive_session(SessionConfig::default());
    let running = spawn_session(session, passed_check());

    advance(100).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Active);
    assert_eq!(snapshot.view.fullscreen, StageStatus::Degraded);
    assert_eq!(snapshot.view.notices().len(), 1);
    assert!(snapshot.fullscreen_armed);

    handle.request_end().expect("request end");
    handle.confirm_exit().expect("confirm");
    let (_, session) = running.await.expect("session task should join");
    assert!(matches!(session.phase(), SessionPhase::Ended(_)));
    assert_eq!(harness.devices.stats().released(), 1);
}
