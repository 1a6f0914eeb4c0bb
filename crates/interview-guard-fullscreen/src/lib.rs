#![warn(missing_docs)]
//! # interview-guard-fullscreen
//!
//! ## Purpose
//! Keeps a proctored session pinned to full-screen and turns escape attempts
//! into exit-confirmation requests.
//!
//! ## Responsibilities
//! - Request full-screen mode when the session starts, tolerating refusal.
//! - Intercept the blocked key set and full-screen loss while armed.
//! - Track the `Compliant`/`ExitAttempted` state and re-enter full-screen on
//!   resume.
//!
//! ## Data flow
//! The session runtime forwards host key and full-screen events into
//! [`FullscreenEnforcer`], which answers with a [`KeyDisposition`] or an
//! [`ExitAttempt`] the controller turns into a confirmation dialog.
//!
//! ## Ownership and lifetimes
//! The enforcer is owned by the session runtime. The host capability is shared
//! behind `Arc` and may outlive the enforcer.
//!
//! ## Error model
//! Host failures are [`FullscreenError`] values. They are never fatal: the
//! enforcer logs them and continues in degraded mode.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Enforcement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenState {
    /// Full-screen held, or no attempt pending.
    Compliant,
    /// An exit attempt is awaiting confirmation.
    ExitAttempted,
}

/// Keys reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Escape.
    Escape,
    /// Alt / Option.
    Alt,
    /// Meta / Windows / Command.
    Meta,
    /// Function key 11.
    F11,
    /// Any other key.
    Other,
}

impl Key {
    /// Returns `true` for keys that can leave full-screen or switch windows.
    pub fn is_blocked(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// What the host should do with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Let the default action run.
    Allow,
    /// Suppress the default action; an attempt is already pending.
    Suppress,
    /// Suppress the default action and open the exit confirmation.
    ExitAttempt,
}

/// Cause of an exit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAttempt {
    /// A blocked key was pressed.
    BlockedKey(Key),
    /// The host left full-screen mode.
    LeftFullscreen,
}

/// Host window capability.
#[async_trait]
pub trait FullscreenHost: Send + Sync {
    /// Enters full-screen mode.
    async fn request_fullscreen(&self) -> Result<(), FullscreenError>;

    /// Leaves full-screen mode.
    async fn exit_fullscreen(&self) -> Result<(), FullscreenError>;

    /// Returns `true` while the window is full-screen.
    fn is_fullscreen(&self) -> bool;
}

/// Full-screen state machine over a [`FullscreenHost`].
pub struct FullscreenEnforcer {
    host: Arc<dyn FullscreenHost>,
    state: FullscreenState,
    armed: bool,
    degraded: bool,
}

impl FullscreenEnforcer {
    /// Creates a disarmed enforcer.
    pub fn new(host: Arc<dyn FullscreenHost>) -> Self {
        Self {
            host,
            state: FullscreenState::Compliant,
            armed: false,
            degraded: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> FullscreenState {
        self.state
    }

    /// Returns `true` while exit interception is active.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns `true` when the host refused full-screen at least once.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Requests full-screen and arms interception. A refusal is logged and
    /// leaves the enforcer armed in degraded mode.
    pub async fn engage(&mut self) -> Result<(), FullscreenError> {
        self.armed = true;
        self.state = FullscreenState::Compliant;
        self.request().await
    }

    /// Handles a key press.
    pub fn on_key(&mut self, key: Key) -> KeyDisposition {
        if !self.armed || !key.is_blocked() {
            return KeyDisposition::Allow;
        }
        match self.state {
            FullscreenState::ExitAttempted => KeyDisposition::Suppress,
            FullscreenState::Compliant => {
                self.state = FullscreenState::ExitAttempted;
                debug!(?key, "blocked key intercepted");
                KeyDisposition::ExitAttempt
            }
        }
    }

    /// Handles a host full-screen change. Returns an attempt when full-screen
    /// was lost while armed and compliant.
    pub fn on_fullscreen_change(&mut self, is_fullscreen: bool) -> Option<ExitAttempt> {
        if is_fullscreen {
            self.state = FullscreenState::Compliant;
            return None;
        }
        if !self.armed || self.state == FullscreenState::ExitAttempted {
            return None;
        }
        self.state = FullscreenState::ExitAttempted;
        info!("full-screen lost while armed");
        Some(ExitAttempt::LeftFullscreen)
    }

    /// Returns to `Compliant` and re-enters full-screen if needed.
    pub async fn resume(&mut self) -> Result<(), FullscreenError> {
        self.state = FullscreenState::Compliant;
        if self.host.is_fullscreen() {
            return Ok(());
        }
        self.request().await
    }

    /// Disarms interception and leaves full-screen. Idempotent.
    pub async fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        self.state = FullscreenState::Compliant;
        if self.host.is_fullscreen() {
            if let Err(error) = self.host.exit_fullscreen().await {
                warn!(%error, "leaving full-screen failed");
            }
        }
        info!("full-screen enforcement released");
    }

    async fn request(&mut self) -> Result<(), FullscreenError> {
        match self.host.request_fullscreen().await {
            Ok(()) => {
                info!("full-screen acquired");
                Ok(())
            }
            Err(error) => {
                self.degraded = true;
                warn!(%error, "full-screen request refused; continuing degraded");
                Err(error)
            }
        }
    }
}

/// Synthetic [`FullscreenHost`] with request counters and a refusal switch.
#[derive(Debug, Default)]
pub struct SyntheticFullscreenHost {
    fullscreen: AtomicBool,
    refuse: AtomicBool,
    requests: AtomicU32,
    exits: AtomicU32,
}

impl SyntheticFullscreenHost {
    /// Creates a windowed host that grants full-screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent requests fail.
    pub fn refuse_requests(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Simulates the user leaving full-screen through the platform.
    pub fn leave(&self) {
        self.fullscreen.store(false, Ordering::SeqCst);
    }

    /// Number of full-screen requests received.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of exit calls received.
    pub fn exits(&self) -> u32 {
        self.exits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FullscreenHost for SyntheticFullscreenHost {
    async fn request_fullscreen(&self) -> Result<(), FullscreenError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(FullscreenError::Denied(
                "request not triggered by user activation".to_string(),
            ));
        }
        self.fullscreen.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exit_fullscreen(&self) -> Result<(), FullscreenError> {
        self.exits.fetch_add(1, Ordering::SeqCst);
        self.fullscreen.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }
}

/// Full-screen host failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FullscreenError {
    /// The host refused the request.
    #[error("full-screen denied: {0}")]
    Denied(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for key interception and state transitions.

    use super::*;

    fn enforcer() -> (Arc<SyntheticFullscreenHost>, FullscreenEnforcer) {
        let host = Arc::new(SyntheticFullscreenHost::new());
        let enforcer = FullscreenEnforcer::new(host.clone());
        (host, enforcer)
    }

    #[test]
    fn disarmed_enforcer_allows_everything() {
        let (_, mut enforcer) = enforcer();
        assert_eq!(enforcer.on_key(Key::Escape), KeyDisposition::Allow);
        assert_eq!(enforcer.on_fullscreen_change(false), None);
    }

    #[tokio::test]
    async fn blocked_key_opens_one_attempt() {
        let (_, mut enforcer) = enforcer();
        enforcer.engage().await.expect("engage should work");

        assert_eq!(enforcer.on_key(Key::Other), KeyDisposition::Allow);
        assert_eq!(enforcer.on_key(Key::F11), KeyDisposition::ExitAttempt);
        assert_eq!(enforcer.on_key(Key::Alt), KeyDisposition::Suppress);
        assert_eq!(enforcer.state(), FullscreenState::ExitAttempted);
    }

    #[tokio::test]
    async fn resume_reacquires_lost_fullscreen() {
        let (host, mut enforcer) = enforcer();
        enforcer.engage().await.expect("engage should work");
        host.leave();

        assert_eq!(
            enforcer.on_fullscreen_change(false),
            Some(ExitAttempt::LeftFullscreen)
        );
        enforcer.resume().await.expect("resume should work");

        assert_eq!(enforcer.state(), FullscreenState::Compliant);
        assert!(host.is_fullscreen());
        assert_eq!(host.requests(), 2);
    }

    #[tokio::test]
    async fn refusal_is_degraded_not_fatal() {
        let (host, mut enforcer) = enforcer();
        host.refuse_requests(true);

        assert!(enforcer.engage().await.is_err());
        assert!(enforcer.is_armed());
        assert!(enforcer.is_degraded());
        assert_eq!(enforcer.on_key(Key::Escape), KeyDisposition::ExitAttempt);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (host, mut enforcer) = enforcer();
        enforcer.engage().await.expect("engage should work");
        enforcer.release().await;
        enforcer.release().await;

        assert_eq!(host.exits(), 1);
        assert_eq!(enforcer.on_key(Key::Escape), KeyDisposition::Allow);
    }
}
