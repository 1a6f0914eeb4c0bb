#![warn(missing_docs)]
//! # interview-guard-app
//!
//! ## Purpose
//! Glue between the process environment and the proctoring session crates.
//!
//! ## Responsibilities
//! - Expose the build-time version shown in the session banner.
//! - Overlay `INTERVIEW_GUARD_*` environment variables onto [`SessionConfig`].
//! - Install the `tracing` subscriber used by the binary.
//! - Keep candidate contact data and non-HTTPS endpoints out of the runtime.
//!
//! ## Data flow
//! Environment -> [`SessionConfig`] + candidate identity -> device check ->
//! `ProctoringSession::run` -> printed summary.
//!
//! ## Ownership and lifetimes
//! Configuration is read once at startup and moved into the session; nothing
//! here holds long-lived state.
//!
//! ## Error model
//! Startup failures are wrapped in [`AppError`]. Failures after the session
//! starts are reported through the session summary instead.
//!
//! ## Security and privacy notes
//! - Candidate e-mail addresses are masked with [`redact_candidate_email`]
//!   before they are logged.
//! - The evidence endpoint must be HTTPS.

use interview_guard_core::{CoreError, DeviceCheckResult};
use interview_guard_evidence::UploadError;
use interview_guard_session::{SessionConfig, SessionError};
use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("INTERVIEW_GUARD_VERSION");

/// Prefix shared by every environment variable the app reads.
pub const ENV_PREFIX: &str = "INTERVIEW_GUARD_";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Version label shown next to the countdown.
pub fn version_label() -> String {
    format!("v{APP_VERSION}")
}

/// Reads `INTERVIEW_GUARD_*` variables from the process environment and
/// overlays them on `base`.
pub fn config_from_env(base: SessionConfig) -> SessionConfig {
    config_from_lookup(base, |name| std::env::var(name).ok())
}

/// Overlays configuration values returned by `lookup` on `base`.
///
/// `lookup` receives the full variable name, for example
/// `INTERVIEW_GUARD_MAX_WARNINGS`. Missing, blank and unparsable values leave
/// the base value untouched.
pub fn config_from_lookup<F>(base: SessionConfig, lookup: F) -> SessionConfig
where
    F: Fn(&str) -> Option<String>,
{
    let read_u64 = |suffix: &str| parse_var::<u64, _>(&lookup, suffix);
    let read_u32 = |suffix: &str| parse_var::<u32, _>(&lookup, suffix);

    SessionConfig {
        session_length_secs: read_u64("SESSION_LENGTH_SECS").unwrap_or(base.session_length_secs),
        clock_tick_ms: read_u64("CLOCK_TICK_MS").unwrap_or(base.clock_tick_ms),
        display_poll_ms: read_u64("DISPLAY_POLL_MS").unwrap_or(base.display_poll_ms),
        presence_sample_ms: read_u64("PRESENCE_SAMPLE_MS").unwrap_or(base.presence_sample_ms),
        recorder_chunk_ms: read_u64("RECORDER_CHUNK_MS").unwrap_or(base.recorder_chunk_ms),
        away_threshold_ms: read_u64("AWAY_THRESHOLD_MS").unwrap_or(base.away_threshold_ms),
        phone_usage_cooldown_ms: read_u64("PHONE_USAGE_COOLDOWN_MS")
            .unwrap_or(base.phone_usage_cooldown_ms),
        multiple_people_cooldown_ms: read_u64("MULTIPLE_PEOPLE_COOLDOWN_MS")
            .unwrap_or(base.multiple_people_cooldown_ms),
        max_warnings: read_u32("MAX_WARNINGS").unwrap_or(base.max_warnings),
        upload_max_retries: read_u32("UPLOAD_MAX_RETRIES").unwrap_or(base.upload_max_retries),
        upload_backoff_ms: read_u64("UPLOAD_BACKOFF_MS").unwrap_or(base.upload_backoff_ms),
        jpeg_quality: parse_var::<u8, _>(&lookup, "JPEG_QUALITY")
            .filter(|quality| (1..=100).contains(quality))
            .unwrap_or(base.jpeg_quality),
        presence_seed: read_u64("PRESENCE_SEED").or(base.presence_seed),
    }
}

fn parse_var<T, F>(lookup: &F, suffix: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(&format!("{ENV_PREFIX}{suffix}")).and_then(|value| value.trim().parse::<T>().ok())
}

/// Checks the log format switch.
///
/// Semantics:
/// - Unset => human-readable output.
/// - `json` (case-insensitive) => JSON lines.
/// - Any other value => human-readable output.
pub fn json_logs_from_env() -> bool {
    match std::env::var("INTERVIEW_GUARD_LOG_FORMAT") {
        Ok(value) => value.trim().eq_ignore_ascii_case("json"),
        Err(_) => false,
    }
}

/// Seed for the presence heuristic: the configured one, or the session start.
pub fn presence_seed(config: &SessionConfig, started_at_ms: u64) -> u64 {
    config.presence_seed.unwrap_or(started_at_ms)
}

/// Installs the global subscriber. `RUST_LOG` wins over `fallback_level`.
///
/// Calling it twice is harmless; the second install is ignored.
pub fn init_tracing(json: bool, fallback_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Masks the local part of an e-mail address for logs.
///
/// Keeps the first character and the domain: `ada@example.test` becomes
/// `a***@example.test`. Input without `@` is fully masked.
pub fn redact_candidate_email(email: &str) -> String {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        _ => "<redacted>".to_string(),
    }
}

/// Startup error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Candidate identity or another core model was invalid.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Session wiring failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// Evidence sink could not be built.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
    /// Evidence endpoint is not HTTPS.
    #[error("insecure evidence endpoint: {0}")]
    InsecureEndpoint(String),
    /// The pre-session device check did not pass.
    #[error("device check failed: {0:?}")]
    DeviceCheck(DeviceCheckResult),
    /// The session task panicked or was cancelled.
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for environment parsing helpers.

    use super::*;

    #[test]
    fn presence_seed_prefers_configured_value() {
        let mut config = SessionConfig::default();
        assert_eq!(presence_seed(&config, 42), 42);
        config.presence_seed = Some(7);
        assert_eq!(presence_seed(&config, 42), 7);
    }

    #[test]
    fn version_label_is_prefixed() {
        assert!(version_label().starts_with('v'));
        assert!(version_label().ends_with(APP_VERSION));
    }
}
