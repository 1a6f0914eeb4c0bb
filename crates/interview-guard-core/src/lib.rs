#![warn(missing_docs)]
//! # interview-guard-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `interview-guard` workspace.
//!
//! ## Responsibilities
//! - Represent live camera frames handed to the presence engine and evidence
//!   pipeline.
//! - Model the per-session state, the violation taxonomy and termination
//!   reasons owned by the session controller.
//! - Model the transient presence samples, capture artifacts and device check
//!   snapshots exchanged between components.
//!
//! ## Data flow
//! Recorder streams emit [`Frame`] values. The presence engine turns a frame
//! into a [`PresenceSample`]; the controller escalates samples into
//! [`Violation`] entries appended to its [`ViolationLog`], each optionally
//! referencing a [`CaptureArtifact`] through an [`EvidenceRef`].
//!
//! ## Ownership and lifetimes
//! Frames and artifacts own their backing buffers (`Vec<u8>`) so they can be
//! moved across the asynchronous evidence path without borrowing the live
//! stream.
//!
//! ## Error model
//! Shape and identity validation failures return [`CoreError`].
//!
//! ## Security and privacy notes
//! Frame bytes are never part of `Debug`-logged summaries emitted by other
//! crates; candidate identity is carried verbatim and redacted at log sites.
//!
//! ## Example
//! ```rust
//! use interview_guard_core::{CandidateIdentity, SessionState, TerminationReason};
//!
//! let identity = CandidateIdentity::new("Ada", "ada@example.test").unwrap();
//! let mut state = SessionState::new(&identity, "session-1", 0, 1_800);
//! assert!(state.terminate(TerminationReason::Timeout));
//! assert!(!state.terminate(TerminationReason::ManualExit));
//! assert_eq!(state.termination_reason, Some(TerminationReason::Timeout));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One RGBA frame sampled from the live camera stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Stable identity of the producing capture device.
    pub source_id: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture time in Unix epoch milliseconds.
    pub captured_at_ms: u64,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidFrameShape`] when the pixel buffer length is
    /// not exactly `width * height * 4`, and [`CoreError::EmptyFrame`] for a
    /// zero-sized geometry.
    pub fn new(
        source_id: impl Into<String>,
        width: u32,
        height: u32,
        captured_at_ms: u64,
        rgba: Vec<u8>,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::EmptyFrame);
        }

        let expected_len = required_rgba_len(width, height)?;
        if rgba.len() != expected_len {
            return Err(CoreError::InvalidFrameShape {
                expected: expected_len,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            source_id: source_id.into(),
            width,
            height,
            captured_at_ms,
            rgba,
        })
    }

    /// Constructs a frame where every pixel has the same RGBA value.
    ///
    /// # Errors
    /// Same as [`Frame::new`].
    pub fn filled(
        source_id: impl Into<String>,
        width: u32,
        height: u32,
        captured_at_ms: u64,
        pixel: [u8; 4],
    ) -> Result<Self, CoreError> {
        let len = required_rgba_len(width, height)?;
        let rgba = pixel.iter().copied().cycle().take(len).collect();
        Self::new(source_id, width, height, captured_at_ms, rgba)
    }

    /// Returns the number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Candidate identity supplied by the identity provider before a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    /// Display name.
    pub name: String,
    /// Contact e-mail.
    pub email: String,
}

impl CandidateIdentity {
    /// Creates an identity. Only emptiness is checked; the controller does not
    /// validate identity itself.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidIdentity`] when name or e-mail is blank.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let email = email.into();
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(CoreError::InvalidIdentity);
        }
        Ok(Self { name, email })
    }
}

/// Policy breach categories recorded by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Candidate absent or facing away for longer than the away threshold.
    LookingAway,
    /// More than one person suspected in frame.
    MultiplePeople,
    /// Candidate suspected of looking down at a phone.
    PhoneUsage,
    /// Unusual activity reported by an auxiliary detector.
    BackgroundActivity,
    /// More than one display surface detected.
    ExtendedDisplay,
    /// Full-screen mode was lost while recording.
    FullscreenExit,
    /// The session window lost visibility or focus.
    TabSwitch,
}

impl ViolationKind {
    /// Stable machine label used in logs, file names and contracts.
    pub fn label(self) -> &'static str {
        match self {
            Self::LookingAway => "looking_away",
            Self::MultiplePeople => "multiple_people",
            Self::PhoneUsage => "phone_usage",
            Self::BackgroundActivity => "background_activity",
            Self::ExtendedDisplay => "extended_display",
            Self::FullscreenExit => "fullscreen_exit",
            Self::TabSwitch => "tab_switch",
        }
    }

    /// Candidate-facing description shown in warning dialogs.
    pub fn description(self) -> &'static str {
        match self {
            Self::LookingAway => {
                "Looking away from camera for more than 10 seconds - please face the camera"
            }
            Self::MultiplePeople => "Multiple people detected - only one person should be visible",
            Self::PhoneUsage => "Mobile phone usage detected - please focus on the interview",
            Self::BackgroundActivity => "Unusual background activity detected",
            Self::ExtendedDisplay => {
                "Extended display detected - please disconnect all additional monitors"
            }
            Self::FullscreenExit => "Full-screen mode was exited during the interview",
            Self::TabSwitch => "Interview window lost focus - please stay on the interview",
        }
    }
}

/// Why a session ended. At most one is ever recorded per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Countdown reached zero.
    Timeout,
    /// Candidate confirmed the exit dialog.
    ManualExit,
    /// Warning count reached the configured limit.
    ViolationLimit,
    /// Extended display detected.
    DisplayViolation,
    /// Fatal device, timer or recorder failure.
    Error,
}

/// Opaque handle to a captured evidence artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRef(pub String);

impl EvidenceRef {
    /// Returns the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One detected policy breach. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Unique violation identifier.
    pub id: String,
    /// Breach category.
    pub kind: ViolationKind,
    /// Detection time in Unix epoch milliseconds.
    pub detected_at_ms: u64,
    /// Captured evidence, when capture succeeded.
    pub evidence_ref: Option<EvidenceRef>,
    /// Optional audit detail, such as the display detection method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Violation {
    /// Serializes the violation to compact JSON bytes for log sinks.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(CoreError::Codec)
    }
}

/// Append-only, insertion-ordered violation log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationLog {
    entries: Vec<Violation>,
}

impl ViolationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one violation and returns a reference to the stored entry.
    pub fn append(&mut self, violation: Violation) -> &Violation {
        self.entries.push(violation);
        &self.entries[self.entries.len() - 1]
    }

    /// Returns the number of recorded violations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns entries in arrival order.
    pub fn entries(&self) -> &[Violation] {
        &self.entries
    }

    /// Consumes the log and returns its entries in arrival order.
    pub fn into_entries(self) -> Vec<Violation> {
        self.entries
    }
}

/// Mutable per-session state owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Candidate display name.
    pub candidate_name: String,
    /// Candidate e-mail.
    pub candidate_email: String,
    /// Session identifier.
    pub session_id: String,
    /// Session start in Unix epoch milliseconds.
    pub started_at_ms: u64,
    /// Seconds elapsed on the countdown.
    pub elapsed_seconds: u64,
    /// Seconds left on the countdown.
    pub remaining_seconds: u64,
    /// Always equal to the violation log length.
    pub warning_count: u32,
    /// Set once the session has ended.
    pub terminated: bool,
    /// The single termination reason, once set.
    pub termination_reason: Option<TerminationReason>,
    /// Start of the current continuous away interval.
    pub looking_away_since_ms: Option<u64>,
    /// Last time a phone-usage violation fired.
    pub last_phone_usage_ms: Option<u64>,
    /// Last time a multiple-people violation fired.
    pub last_multiple_people_ms: Option<u64>,
}

impl SessionState {
    /// Creates a fresh session state with a full countdown.
    pub fn new(
        identity: &CandidateIdentity,
        session_id: impl Into<String>,
        started_at_ms: u64,
        session_length_secs: u64,
    ) -> Self {
        Self {
            candidate_name: identity.name.clone(),
            candidate_email: identity.email.clone(),
            session_id: session_id.into(),
            started_at_ms,
            elapsed_seconds: 0,
            remaining_seconds: session_length_secs,
            warning_count: 0,
            terminated: false,
            termination_reason: None,
            looking_away_since_ms: None,
            last_phone_usage_ms: None,
            last_multiple_people_ms: None,
        }
    }

    /// Copies the countdown into the state.
    ///
    /// Ignored once terminated, and `remaining_seconds` never increases.
    pub fn sync_clock(&mut self, elapsed_seconds: u64, remaining_seconds: u64) {
        if self.terminated {
            return;
        }
        self.elapsed_seconds = self.elapsed_seconds.max(elapsed_seconds);
        self.remaining_seconds = self.remaining_seconds.min(remaining_seconds);
    }

    /// Records the termination reason.
    ///
    /// Returns `true` only for the call that actually terminated the session.
    pub fn terminate(&mut self, reason: TerminationReason) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        self.termination_reason = Some(reason);
        true
    }
}

/// Snapshot of the pre-session device check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCheckResult {
    /// Camera could be opened.
    pub camera: bool,
    /// Microphone could be opened.
    pub microphone: bool,
    /// Exactly one display surface was detected.
    pub single_display: bool,
}

impl DeviceCheckResult {
    /// Returns `true` when every check passed.
    pub fn all_passed(&self) -> bool {
        self.camera && self.microphone && self.single_display
    }
}

/// Per-tick presence classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceClassification {
    /// Exactly one attentive person is visible.
    SinglePersonPresent,
    /// Nobody visible or the candidate faces away.
    LookingAway,
    /// Candidate visible but suspected of looking at a phone.
    PhoneUsageSuspected,
    /// More than one person suspected.
    MultiplePeopleSuspected,
}

impl PresenceClassification {
    /// Returns `true` when the candidate counts as present for away tracking.
    pub fn is_present(self) -> bool {
        matches!(self, Self::SinglePersonPresent | Self::PhoneUsageSuspected)
    }
}

/// Raw signals behind one classification.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceSignals {
    /// Average luminance of the circular face zone.
    pub face_luminance: f32,
    /// Average luminance of the top band.
    pub upper_luminance: f32,
    /// Average luminance of the bottom band.
    pub lower_luminance: f32,
    /// Share of frame pixels inside the face zone.
    pub face_zone_ratio: f32,
}

/// Transient output of one presence sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceSample {
    /// Sampling time in Unix epoch milliseconds.
    pub timestamp_ms: u64,
    /// Classification outcome.
    pub classification: PresenceClassification,
    /// Signals the classification was derived from.
    pub signals: ConfidenceSignals,
}

/// Annotated evidence image produced by the capture pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    /// Local handle, stable across upload retries.
    pub evidence_ref: EvidenceRef,
    /// Capture number, unique within one session.
    pub sequence: u64,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Creation time in Unix epoch milliseconds.
    pub created_at_ms: u64,
    /// Overlay text rendered into the banners.
    pub annotation_text: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for CaptureArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureArtifact")
            .field("evidence_ref", &self.evidence_ref)
            .field("sequence", &self.sequence)
            .field("bytes_len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("created_at_ms", &self.created_at_ms)
            .field("annotation_text", &self.annotation_text)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Error type for core model validation and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Frame geometry has a zero dimension.
    #[error("frame geometry must be non-empty")]
    EmptyFrame,
    /// Frame dimensions overflow addressable memory.
    #[error("frame dimensions overflow")]
    Overflow,
    /// Candidate name or e-mail is blank.
    #[error("candidate name and e-mail must be non-empty")]
    InvalidIdentity,
    /// JSON encoding/decoding error.
    #[error("record codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CoreError::Overflow)
}

#[cfg(test)]
mod tests {
    //! Unit tests for model invariants.

    use super::*;

    fn identity() -> CandidateIdentity {
        CandidateIdentity::new("Ada", "ada@example.test").expect("identity should be valid")
    }

    #[test]
    fn frame_rejects_mismatched_buffer() {
        let error = Frame::new("camera-0", 2, 2, 0, vec![0; 15]).expect_err("shape must fail");
        assert!(matches!(
            error,
            CoreError::InvalidFrameShape {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn filled_frame_repeats_pixel() {
        let frame = Frame::filled("camera-0", 3, 2, 7, [1, 2, 3, 4]).expect("frame should build");
        assert_eq!(frame.rgba.len(), 24);
        assert_eq!(&frame.rgba[20..24], &[1, 2, 3, 4]);
    }

    #[test]
    fn remaining_seconds_is_frozen_after_termination() {
        let mut state = SessionState::new(&identity(), "s", 0, 100);
        state.sync_clock(10, 90);
        state.sync_clock(11, 95);
        assert_eq!(state.remaining_seconds, 90);

        state.terminate(TerminationReason::ManualExit);
        state.sync_clock(20, 80);
        assert_eq!(state.remaining_seconds, 90);
        assert_eq!(state.elapsed_seconds, 11);
    }

    #[test]
    fn blank_identity_is_rejected() {
        assert!(matches!(
            CandidateIdentity::new(" ", "x@example.test"),
            Err(CoreError::InvalidIdentity)
        ));
    }

    #[test]
    fn violation_json_uses_snake_case_kind() {
        let violation = Violation {
            id: "v-1".to_string(),
            kind: ViolationKind::PhoneUsage,
            detected_at_ms: 5,
            evidence_ref: Some(EvidenceRef("ev-1".to_string())),
            detail: None,
        };
        let raw = String::from_utf8(violation.to_json_bytes().expect("encode")).expect("utf8");
        assert!(raw.contains("\"kind\":\"phone_usage\""));
        assert!(raw.contains("\"evidence_ref\":\"ev-1\""));
        assert!(!raw.contains("detail"));
    }
}
