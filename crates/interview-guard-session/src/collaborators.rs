//! External collaborators the controller reports to.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use interview_guard_core::{TerminationReason, Violation};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Persists violations for later review.
#[async_trait]
pub trait ViolationLogSink: Send + Sync {
    /// Persists one violation. Failures are non-fatal to the session.
    async fn persist(&self, session_id: &str, violation: &Violation) -> Result<(), SessionError>;
}

/// Payload handed to the session-end collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEndReport {
    /// Session identifier.
    pub session_id: String,
    /// Final warning count.
    pub warning_count: u32,
    /// Why the session ended.
    pub termination_reason: TerminationReason,
    /// Seconds counted down before the end.
    pub duration_seconds: u64,
}

/// Receives the end-of-session report. Called exactly once per session.
pub trait SessionEndNotifier: Send + Sync {
    /// Handles the report.
    fn session_ended(&self, report: &SessionEndReport);
}

/// In-memory [`ViolationLogSink`] with a failure switch.
#[derive(Debug, Default)]
pub struct InMemoryViolationLog {
    entries: Mutex<Vec<(String, Violation)>>,
    failing: AtomicBool,
}

impl InMemoryViolationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Persisted violations, in write order.
    pub fn violations(&self) -> Vec<Violation> {
        self.entries
            .lock()
            .map(|entries| entries.iter().map(|(_, violation)| violation.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ViolationLogSink for InMemoryViolationLog {
    async fn persist(&self, session_id: &str, violation: &Violation) -> Result<(), SessionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::ViolationLogSink("log store unavailable".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| SessionError::ViolationLogSink("log store lock poisoned".to_string()))?
            .push((session_id.to_string(), violation.clone()));
        Ok(())
    }
}

/// [`SessionEndNotifier`] that keeps every report it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<SessionEndReport>>,
}

impl RecordingNotifier {
    /// Creates an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far.
    pub fn reports(&self) -> Vec<SessionEndReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    /// Number of reports received.
    pub fn calls(&self) -> usize {
        self.reports.lock().map(|reports| reports.len()).unwrap_or(0)
    }
}

impl SessionEndNotifier for RecordingNotifier {
    fn session_ended(&self, report: &SessionEndReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
    }
}
