//! Integration tests for full-screen exit interception across a session.

use std::sync::Arc;

use interview_guard_fullscreen::{
    ExitAttempt, FullscreenEnforcer, FullscreenHost, FullscreenState, Key, KeyDisposition,
    SyntheticFullscreenHost,
};

#[tokio::test]
async fn exit_interception_tests_every_blocked_key_is_intercepted() {
    for key in [Key::Escape, Key::Alt, Key::Meta, Key::F11] {
        let host = Arc::new(SyntheticFullscreenHost::new());
        let mut enforcer = FullscreenEnforcer::new(host);
        enforcer.engage().await.expect("engage should work");

        assert_eq!(enforcer.on_key(key), KeyDisposition::ExitAttempt, "{key:?}");
    }
}

#[tokio::test]
async fn exit_interception_tests_key_then_platform_exit_is_one_attempt() {
    let host = Arc::new(SyntheticFullscreenHost::new());
    let mut enforcer = FullscreenEnforcer::new(host.clone());
    enforcer.engage().await.expect("engage should work");

    assert_eq!(enforcer.on_key(Key::Escape), KeyDisposition::ExitAttempt);
    host.leave();
    assert_eq!(enforcer.on_fullscreen_change(false), None);
    assert_eq!(enforcer.state(), FullscreenState::ExitAttempted);

    enforcer.resume().await.expect("resume should work");
    assert!(host.is_fullscreen());

    host.leave();
    assert_eq!(
        enforcer.on_fullscreen_change(false),
        Some(ExitAttempt::LeftFullscreen)
    );
}

#[tokio::test]
async fn exit_interception_tests_nothing_intercepted_after_release() {
    let host = Arc::new(SyntheticFullscreenHost::new());
    let mut enforcer = FullscreenEnforcer::new(host.clone());
    enforcer.engage().await.expect("engage should work");
    enforcer.release().await;

    assert!(!host.is_fullscreen());
    assert_eq!(enforcer.on_key(Key::Meta), KeyDisposition::Allow);
    assert_eq!(enforcer.on_fullscreen_change(false), None);
}
