#![warn(missing_docs)]
//! # interview-guard-evidence
//!
//! ## Purpose
//! Captures annotated evidence images on violations and hands evidence to an
//! external storage sink.
//!
//! ## Responsibilities
//! - Render the current frame with a violation banner and a timestamp footer
//!   and encode it as JPEG ([`EvidenceCapture`]).
//! - Define the [`EvidenceSink`] capability and an in-memory stand-in.
//! - Retry retriable upload failures, derive idempotency keys and retain
//!   artifacts locally when upload gives up ([`EvidenceUploader`]).
//!
//! ## Data flow
//! Violation -> [`EvidenceCapture::capture`] reads a [`FrameSource`] ->
//! [`interview_guard_core::CaptureArtifact`] -> [`EvidenceUpload`] (ownership
//! moves here) -> [`EvidenceUploader::upload`] -> [`UploadOutcome`].
//!
//! ## Ownership and lifetimes
//! Artifacts are moved into the upload envelope, so the capture pipeline holds
//! no reference once evidence is handed off.
//!
//! ## Error model
//! Capture failures ([`CaptureError`]) and upload failures ([`UploadError`])
//! are non-fatal; callers log them and carry on monitoring.

mod capture;
mod upload;

pub use capture::{
    BANNER_HEIGHT_PX, CaptureError, DEFAULT_JPEG_QUALITY, EvidenceCapture, FOOTER_HEIGHT_PX,
    FrameSource, annotation_text, format_capture_timestamp,
};
pub use upload::{
    EvidenceSink, EvidenceUpload, EvidenceUploader, FailureClass, InMemoryEvidenceSink,
    LocalEvidenceStore, RetryPolicy, UploadError, UploadOutcome, UploadReceipt,
    classify_upload_error, idempotency_key,
};
