#![warn(missing_docs)]
//! # interview-guard-app binary
//!
//! Runs one simulated proctored session against synthetic devices.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use interview_guard_app::{
    AppError, app_version, config_from_env, init_tracing, is_https_endpoint, json_logs_from_env,
    presence_seed, redact_candidate_email, version_label,
};
use interview_guard_core::CandidateIdentity;
use interview_guard_display::{DisplaySentinel, SyntheticDisplayProbe};
use interview_guard_evidence::{InMemoryEvidenceSink, LocalEvidenceStore};
use interview_guard_fullscreen::SyntheticFullscreenHost;
use interview_guard_presence::BrightnessHeuristic;
use interview_guard_recorder::SyntheticMediaDevices;
use interview_guard_session::{
    InMemoryViolationLog, ProctoringSession, RecordingNotifier, SessionConfig, SessionContext,
    SessionDeps, SessionHandle, SessionSummary, run_device_check,
};
use tracing::{error, info, warn};

const DEMO_SESSION_SECS: u64 = 12;
const DEFAULT_EVIDENCE_ENDPOINT: &str = "https://evidence.interview-guard.test/uploads";

/// CLI entry point.
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(json_logs_from_env(), "info");
    info!(version = app_version(), "interview-guard starting");

    match run_demo().await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "demo session failed");
            eprintln!("interview-guard: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run_demo() -> Result<SessionSummary, AppError> {
    let config = config_from_env(SessionConfig {
        session_length_secs: DEMO_SESSION_SECS,
        ..SessionConfig::default()
    });
    let identity = CandidateIdentity::new(
        env_or("INTERVIEW_GUARD_CANDIDATE_NAME", "Demo Candidate"),
        env_or("INTERVIEW_GUARD_CANDIDATE_EMAIL", "candidate@example.test"),
    )?;
    let endpoint = env_or("INTERVIEW_GUARD_EVIDENCE_ENDPOINT", DEFAULT_EVIDENCE_ENDPOINT);
    if !is_https_endpoint(&endpoint) {
        return Err(AppError::InsecureEndpoint(endpoint));
    }

    let started_at_ms = now_unix_ms();
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(
        %session_id,
        candidate = %redact_candidate_email(&identity.email),
        session_length_secs = config.session_length_secs,
        "preparing session"
    );

    let devices = Arc::new(SyntheticMediaDevices::new());
    let display_probe = Arc::new(SyntheticDisplayProbe::default());
    let mut gate_sentinel = DisplaySentinel::new(display_probe.clone());
    let device_check = run_device_check(devices.as_ref(), &mut gate_sentinel).await;
    if !device_check.all_passed() {
        return Err(AppError::DeviceCheck(device_check));
    }

    let deps = SessionDeps {
        devices,
        display_probe,
        fullscreen_host: Arc::new(SyntheticFullscreenHost::new()),
        classifier: Box::new(BrightnessHeuristic::new(presence_seed(&config, started_at_ms))),
        evidence_sink: Arc::new(InMemoryEvidenceSink::new(
            &endpoint,
            Duration::from_millis(150),
        )?),
        local_store: Arc::new(LocalEvidenceStore::new()),
        violation_log: Arc::new(InMemoryViolationLog::new()),
        notifier: Arc::new(RecordingNotifier::new()),
    };
    let context = SessionContext {
        identity,
        session_id,
        started_at_ms,
        app_version: version_label(),
    };

    let (mut session, handle) = ProctoringSession::new(config, context, deps)?;
    let running = tokio::spawn(async move { session.run(device_check).await });
    drive_candidate(&handle).await;
    let summary = running.await?;
    Ok(summary)
}

/// Plays a short candidate script: one focus loss, then an acknowledgement.
async fn drive_candidate(handle: &SessionHandle) {
    tokio::time::sleep(Duration::from_secs(2)).await;
    if let Err(error) = handle.visibility_lost() {
        warn!(%error, "session ended before the focus loss was delivered");
        return;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    if let Err(error) = handle.acknowledge_warning() {
        warn!(%error, "session ended before the warning was acknowledged");
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("interview-guard {}", version_label());
    println!(
        "termination_reason={:?} elapsed_seconds={} warning_count={}",
        summary.state.termination_reason,
        summary.state.elapsed_seconds,
        summary.state.warning_count
    );
    for violation in &summary.violations {
        println!(
            "violation kind={} at_ms={} evidence={}",
            violation.kind.label(),
            violation.detected_at_ms,
            violation
                .evidence_ref
                .as_ref()
                .map_or("none", |evidence| evidence.as_str())
        );
    }
    if let Some(error) = &summary.fatal_error {
        println!("fatal_error={}", error.user_message());
    }
    println!("recording_handed_off={}", summary.recording.is_some());
}

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
