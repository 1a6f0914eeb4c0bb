//! Shared fixtures for session integration tests.

use std::sync::Arc;
use std::time::Duration;

use interview_guard_core::{CandidateIdentity, DeviceCheckResult, PresenceClassification};
use interview_guard_display::SyntheticDisplayProbe;
use interview_guard_evidence::{InMemoryEvidenceSink, LocalEvidenceStore};
use interview_guard_fullscreen::SyntheticFullscreenHost;
use interview_guard_presence::ScriptedClassifier;
use interview_guard_recorder::SyntheticMediaDevices;
use interview_guard_session::{
    InMemoryViolationLog, ProctoringSession, RecordingNotifier, SessionConfig, SessionContext,
    SessionDeps, SessionHandle, SessionSummary,
};
use tokio::task::JoinHandle;

/// Start of every fixture session, in Unix epoch milliseconds.
#[allow(dead_code)]
pub const STARTED_AT_MS: u64 = 1_700_000_000_000;

/// Synthetic capabilities plus the collaborators a test inspects afterwards.
#[allow(dead_code)]
pub struct Harness {
    pub devices: Arc<SyntheticMediaDevices>,
    pub display: Arc<SyntheticDisplayProbe>,
    pub host: Arc<SyntheticFullscreenHost>,
    pub sink: Arc<InMemoryEvidenceSink>,
    pub local: Arc<LocalEvidenceStore>,
    pub log: Arc<InMemoryViolationLog>,
    pub notifier: Arc<RecordingNotifier>,
}

#[allow(dead_code)]
impl Harness {
    /// Creates a compliant environment with a fast in-memory sink.
    pub fn new() -> Self {
        Self {
            devices: Arc::new(SyntheticMediaDevices::new()),
            display: Arc::new(SyntheticDisplayProbe::default()),
            host: Arc::new(SyntheticFullscreenHost::new()),
            sink: Arc::new(
                InMemoryEvidenceSink::new("https://drive.example.test/evidence", Duration::ZERO)
                    .expect("sink fixture should build"),
            ),
            local: Arc::new(LocalEvidenceStore::new()),
            log: Arc::new(InMemoryViolationLog::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Builds a session whose presence engine replays `script`.
    pub fn session(
        &self,
        config: SessionConfig,
        script: Vec<PresenceClassification>,
    ) -> (ProctoringSession, SessionHandle) {
        let context = SessionContext {
            identity: CandidateIdentity::new("Ada Lovelace", "ada@example.test")
                .expect("identity fixture should be valid"),
            session_id: "session-fixture".to_string(),
            started_at_ms: STARTED_AT_MS,
            app_version: "v0.1.0".to_string(),
        };
        let deps = SessionDeps {
            devices: self.devices.clone(),
            display_probe: self.display.clone(),
            fullscreen_host: self.host.clone(),
            classifier: Box::new(ScriptedClassifier::new(script)),
            evidence_sink: self.sink.clone(),
            local_store: self.local.clone(),
            violation_log: self.log.clone(),
            notifier: self.notifier.clone(),
        };
        ProctoringSession::new(config, context, deps).expect("session fixture should build")
    }

    /// Builds a session where the candidate is always present.
    pub fn attentive_session(&self, config: SessionConfig) -> (ProctoringSession, SessionHandle) {
        self.session(config, vec![PresenceClassification::SinglePersonPresent])
    }
}

/// A device check where everything passed.
#[allow(dead_code)]
pub fn passed_check() -> DeviceCheckResult {
    DeviceCheckResult {
        camera: true,
        microphone: true,
        single_display: true,
    }
}

/// Runs the session on its own task; the task returns the summary and the
/// session so tests can call teardown again.
#[allow(dead_code)]
pub fn spawn_session(
    mut session: ProctoringSession,
    check: DeviceCheckResult,
) -> JoinHandle<(SessionSummary, ProctoringSession)> {
    tokio::spawn(async move {
        let summary = session.run(check).await;
        (summary, session)
    })
}

/// Advances virtual time by `millis`.
#[allow(dead_code)]
pub async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
