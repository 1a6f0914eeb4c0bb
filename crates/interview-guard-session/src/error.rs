//! Session error taxonomy.

use interview_guard_core::DeviceCheckResult;
use interview_guard_evidence::{CaptureError, UploadError};
use interview_guard_fullscreen::FullscreenError;
use interview_guard_recorder::RecorderError;
use thiserror::Error;

/// How a failure affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Ends the session with `Error`, or refuses to start it.
    Fatal,
    /// The session continues with a degraded stage.
    Degraded,
    /// Logged and otherwise ignored.
    NonFatal,
}

/// Controller failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A tunable is out of range.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    /// The device-check gate did not pass.
    #[error("device check failed: {0:?}")]
    DeviceCheckFailed(DeviceCheckResult),
    /// Camera or microphone could not be acquired at start.
    #[error("device acquisition failed: {0}")]
    DeviceAcquisition(RecorderError),
    /// Full-screen could not be acquired.
    #[error("full-screen acquisition failed: {0}")]
    FullscreenAcquisition(#[from] FullscreenError),
    /// Evidence capture produced nothing.
    #[error("evidence capture failed: {0}")]
    EvidenceCapture(#[from] CaptureError),
    /// Evidence upload gave up; the artifact is kept locally.
    #[error("evidence upload failed: {0}")]
    EvidenceUpload(#[from] UploadError),
    /// The violation log collaborator failed.
    #[error("violation log sink failed: {0}")]
    ViolationLogSink(String),
    /// The recorder failed while recording.
    #[error("recorder failed: {0}")]
    Recorder(RecorderError),
    /// A transition was requested from the wrong phase.
    #[error("invalid session transition: {0}")]
    InvalidTransition(String),
    /// The session runtime is gone.
    #[error("session channel closed")]
    ChannelClosed,
}

impl SessionError {
    /// Maps the failure onto its effect on the session.
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidConfig(_)
            | Self::DeviceCheckFailed(_)
            | Self::DeviceAcquisition(_)
            | Self::Recorder(_)
            | Self::InvalidTransition(_) => Severity::Fatal,
            Self::FullscreenAcquisition(_) | Self::EvidenceUpload(_) => Severity::Degraded,
            Self::EvidenceCapture(_) | Self::ViolationLogSink(_) | Self::ChannelClosed => {
                Severity::NonFatal
            }
        }
    }

    /// Candidate-facing message for fatal failures.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DeviceCheckFailed(_) => {
                "Device check failed. Please connect a camera, a microphone and a single display."
            }
            Self::DeviceAcquisition(_) => {
                "Camera or microphone could not be started. Please check permissions and try again."
            }
            Self::Recorder(_) => "Recording stopped unexpectedly. The interview has been ended.",
            _ => "The interview could not continue. Please contact support.",
        }
    }
}
