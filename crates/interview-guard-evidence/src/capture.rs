//! Annotated evidence capture.

use image::codecs::jpeg::JpegEncoder;
use interview_guard_core::{CaptureArtifact, EvidenceRef, Frame, ViolationKind};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

/// Height of the violation banner drawn across the top of the frame.
pub const BANNER_HEIGHT_PX: u32 = 40;
/// Height of the timestamp footer drawn across the bottom of the frame.
pub const FOOTER_HEIGHT_PX: u32 = 30;
/// JPEG quality used for evidence images.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

const BANNER_RGB: [u8; 3] = [255, 0, 0];
const BANNER_ALPHA: f32 = 0.8;
const FOOTER_RGB: [u8; 3] = [255, 255, 255];
const FOOTER_ALPHA: f32 = 0.9;

/// Read-only access to the most recent frame of the live stream.
pub trait FrameSource: Send + Sync {
    /// Returns the latest frame, or `None` when no frame is available yet.
    fn latest_frame(&self) -> Option<Frame>;
}

/// Renders and encodes evidence images.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceCapture {
    jpeg_quality: u8,
}

impl Default for EvidenceCapture {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl EvidenceCapture {
    /// Creates a pipeline with the given JPEG quality (clamped to 1..=100).
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Captures the current frame for `kind`. `sequence` must be unique per
    /// session; it keeps evidence refs of same-instant captures apart.
    ///
    /// Never fails loudly: a missing frame or encoding failure is logged and
    /// yields `None`.
    pub fn capture(
        &self,
        source: &dyn FrameSource,
        kind: ViolationKind,
        captured_at_ms: u64,
        sequence: u64,
    ) -> Option<CaptureArtifact> {
        match self.try_capture(source, kind, captured_at_ms, sequence) {
            Ok(artifact) => {
                debug!(
                    kind = kind.label(),
                    evidence_ref = artifact.evidence_ref.as_str(),
                    bytes = artifact.bytes.len(),
                    "evidence captured"
                );
                Some(artifact)
            }
            Err(error) => {
                warn!(kind = kind.label(), %error, "evidence capture failed");
                None
            }
        }
    }

    /// Fallible variant of [`EvidenceCapture::capture`].
    ///
    /// # Errors
    /// Returns [`CaptureError::NoFrame`] when the source has no frame,
    /// [`CaptureError::Timestamp`] for an unrepresentable capture time and
    /// [`CaptureError::Encode`] when JPEG encoding fails.
    pub fn try_capture(
        &self,
        source: &dyn FrameSource,
        kind: ViolationKind,
        captured_at_ms: u64,
        sequence: u64,
    ) -> Result<CaptureArtifact, CaptureError> {
        let frame = source.latest_frame().ok_or(CaptureError::NoFrame)?;
        let timestamp = format_capture_timestamp(captured_at_ms)?;
        let annotation = annotation_text(kind, &timestamp);

        let mut rgba = frame.rgba;
        draw_band(
            &mut rgba,
            frame.width,
            0,
            BANNER_HEIGHT_PX.min(frame.height),
            BANNER_RGB,
            BANNER_ALPHA,
        );
        let footer_height = FOOTER_HEIGHT_PX.min(frame.height);
        draw_band(
            &mut rgba,
            frame.width,
            frame.height - footer_height,
            footer_height,
            FOOTER_RGB,
            FOOTER_ALPHA,
        );

        let rgb = rgba_to_rgb(&rgba);
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality)
            .encode(&rgb, frame.width, frame.height, image::ColorType::Rgb8.into())
            .map_err(|error| CaptureError::Encode(error.to_string()))?;

        let evidence_ref = evidence_ref_for(kind, captured_at_ms, sequence, &bytes);
        Ok(CaptureArtifact {
            evidence_ref,
            sequence,
            bytes,
            mime_type: "image/jpeg".to_string(),
            created_at_ms: captured_at_ms,
            annotation_text: annotation,
            width: frame.width,
            height: frame.height,
        })
    }
}

/// Overlay text for one capture: the banner line and the footer line.
pub fn annotation_text(kind: ViolationKind, timestamp: &str) -> String {
    format!("WARNING: {}\nCaptured: {timestamp}", kind.description())
}

/// Formats epoch milliseconds as RFC 3339 in UTC.
///
/// # Errors
/// Returns [`CaptureError::Timestamp`] when the instant is out of range.
pub fn format_capture_timestamp(epoch_ms: u64) -> Result<String, CaptureError> {
    let nanos = i128::from(epoch_ms) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|error| CaptureError::Timestamp(error.to_string()))?
        .format(&Rfc3339)
        .map_err(|error| CaptureError::Timestamp(error.to_string()))
}

/// Alpha-blends a solid color over rows `top..top + rows`.
fn draw_band(rgba: &mut [u8], width: u32, top: u32, rows: u32, color: [u8; 3], alpha: f32) {
    let row_len = width as usize * 4;
    let start = top as usize * row_len;
    let end = (start + rows as usize * row_len).min(rgba.len());
    for pixel in rgba[start..end].chunks_exact_mut(4) {
        for channel in 0..3 {
            let under = f32::from(pixel[channel]);
            let over = f32::from(color[channel]);
            pixel[channel] = (over * alpha + under * (1.0 - alpha)).round() as u8;
        }
    }
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((rgba.len() / 4) * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

fn evidence_ref_for(
    kind: ViolationKind,
    captured_at_ms: u64,
    sequence: u64,
    bytes: &[u8],
) -> EvidenceRef {
    let digest = Sha256::digest(bytes);
    EvidenceRef(format!(
        "evidence-{}-{captured_at_ms}-{sequence}-{}",
        kind.label(),
        hex::encode(&digest[..8])
    ))
}

/// Evidence capture failures. Always non-fatal to the session.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The frame source had no frame.
    #[error("no frame available for capture")]
    NoFrame,
    /// The capture timestamp could not be formatted.
    #[error("capture timestamp invalid: {0}")]
    Timestamp(String),
    /// Image encoding failed.
    #[error("evidence encoding failed: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for overlay rendering and capture fallbacks.

    use super::*;

    struct FixedSource(Option<Frame>);

    impl FrameSource for FixedSource {
        fn latest_frame(&self) -> Option<Frame> {
            self.0.clone()
        }
    }

    #[test]
    fn banner_blends_towards_red() {
        let mut rgba = vec![0_u8; 2 * 2 * 4];
        draw_band(&mut rgba, 2, 0, 1, BANNER_RGB, BANNER_ALPHA);
        assert_eq!(&rgba[0..4], &[204, 0, 0, 0]);
        assert_eq!(&rgba[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn capture_without_frame_returns_none() {
        let capture = EvidenceCapture::default();
        assert!(
            capture
                .capture(&FixedSource(None), ViolationKind::LookingAway, 0, 1)
                .is_none()
        );
    }

    #[test]
    fn capture_encodes_jpeg_with_annotation() {
        let frame = Frame::filled("camera-0", 64, 48, 0, [90, 90, 90, 255]).expect("frame");
        let artifact = EvidenceCapture::default()
            .try_capture(
                &FixedSource(Some(frame)),
                ViolationKind::MultiplePeople,
                1_700_000_000_000,
                3,
            )
            .expect("capture should work");

        assert_eq!(artifact.mime_type, "image/jpeg");
        assert_eq!(&artifact.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!((artifact.width, artifact.height), (64, 48));
        assert!(artifact.annotation_text.starts_with("WARNING: Multiple people"));
        assert!(artifact.annotation_text.contains("Captured: 2023-11-14T22:13:20Z"));
        assert!(
            artifact
                .evidence_ref
                .as_str()
                .starts_with("evidence-multiple_people-1700000000000-3-")
        );
    }

    #[test]
    fn same_instant_captures_get_distinct_refs() {
        let frame = Frame::filled("camera-0", 16, 16, 0, [40, 40, 40, 255]).expect("frame");
        let source = FixedSource(Some(frame));
        let capture = EvidenceCapture::default();

        let first = capture
            .try_capture(&source, ViolationKind::BackgroundActivity, 500, 1)
            .expect("first capture");
        let second = capture
            .try_capture(&source, ViolationKind::BackgroundActivity, 500, 2)
            .expect("second capture");

        assert_eq!(first.bytes, second.bytes);
        assert_ne!(first.evidence_ref, second.evidence_ref);
    }

    #[test]
    fn tiny_frames_do_not_overflow_bands() {
        let frame = Frame::filled("camera-0", 4, 4, 0, [0, 0, 0, 255]).expect("frame");
        assert!(
            EvidenceCapture::default()
                .try_capture(&FixedSource(Some(frame)), ViolationKind::TabSwitch, 0, 1)
                .is_ok()
        );
    }
}
