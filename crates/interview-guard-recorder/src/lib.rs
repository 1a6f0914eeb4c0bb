#![warn(missing_docs)]
//! # interview-guard-recorder
//!
//! ## Purpose
//! Owns the session countdown and the continuous audio/video capture
//! lifecycle.
//!
//! ## Responsibilities
//! - Count down the session length while recording ([`SessionTimer`]).
//! - Acquire the combined capture stream, buffer recording chunks and flush
//!   them into a final artifact on stop ([`Recorder`]).
//! - Release capture devices on every exit path, including a stop that races
//!   an in-flight start.
//! - Expose read-only frame access for presence sampling and evidence capture.
//!
//! ## Data flow
//! [`Recorder::start`] -> [`MediaDevices::acquire`] -> [`MediaStream`] held in a
//! [`StreamLease`]. Chunk ticks call [`Recorder::collect_chunk`]. Stop drains the
//! chunks into a [`RecordingArtifact`] which is handed to the evidence sink
//! before the lease is dropped.
//!
//! ## Ownership and lifetimes
//! Only the recorder holds the stream lease. Other components read frames
//! through [`RecorderFrames`] and can never stop or reconfigure devices.
//!
//! ## Error model
//! Acquisition failures are [`RecorderError`] values and are fatal to session
//! start. A failing chunk read during recording is fatal to the session.

mod devices;
mod timer;

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use interview_guard_core::Frame;
use interview_guard_evidence::{EvidenceUpload, EvidenceUploader, FrameSource, UploadOutcome};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use devices::{DeviceStats, SyntheticMediaDevices};
pub use timer::{SessionTimer, TimerTick};

/// MIME type of recordings produced by the combined stream.
pub const RECORDING_MIME_TYPE: &str = "video/webm";

/// Capture device categories probed by the device check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Video input.
    Camera,
    /// Audio input.
    Microphone,
}

/// Live combined audio/video stream.
pub trait MediaStream: Send {
    /// Most recent decoded video frame.
    fn latest_frame(&self) -> Option<Frame>;

    /// Takes the encoded media produced since the previous call.
    ///
    /// # Errors
    /// Returns [`RecorderError::StreamFailed`] when the stream died.
    fn take_chunk(&mut self) -> Result<Option<Vec<u8>>, RecorderError>;

    /// Stops all tracks. Must be idempotent.
    fn release(&mut self);
}

/// Capability that opens capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Checks that one device kind can be opened, without keeping it.
    async fn probe(&self, kind: DeviceKind) -> Result<(), RecorderError>;

    /// Opens the combined audio/video stream.
    async fn acquire(&self) -> Result<Box<dyn MediaStream>, RecorderError>;
}

/// Owns an acquired stream and releases it when dropped.
pub struct StreamLease {
    stream: Box<dyn MediaStream>,
}

impl StreamLease {
    /// Wraps a freshly acquired stream.
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self { stream }
    }

    fn stream(&self) -> &dyn MediaStream {
        self.stream.as_ref()
    }

    fn stream_mut(&mut self) -> &mut dyn MediaStream {
        self.stream.as_mut()
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        self.stream.release();
    }
}

/// Recorder lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    /// Never started.
    Idle,
    /// Acquisition in flight.
    Starting,
    /// Stream held, chunks being collected.
    Recording,
    /// Stopped; devices released.
    Stopped,
}

/// Final recording handed to the evidence sink.
#[derive(Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    /// Concatenated chunk bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Number of chunks flushed.
    pub chunk_count: usize,
    /// Flush time in Unix epoch milliseconds.
    pub created_at_ms: u64,
}

impl std::fmt::Debug for RecordingArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingArtifact")
            .field("bytes_len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("chunk_count", &self.chunk_count)
            .field("created_at_ms", &self.created_at_ms)
            .finish()
    }
}

struct RecorderInner {
    phase: RecorderPhase,
    stop_requested: bool,
    lease: Option<StreamLease>,
    chunks: Vec<Vec<u8>>,
}

/// Continuous recorder over a [`MediaDevices`] capability.
#[derive(Clone)]
pub struct Recorder {
    devices: Arc<dyn MediaDevices>,
    inner: Arc<Mutex<RecorderInner>>,
}

impl Recorder {
    /// Creates an idle recorder.
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            inner: Arc::new(Mutex::new(RecorderInner {
                phase: RecorderPhase::Idle,
                stop_requested: false,
                lease: None,
                chunks: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecorderInner>, RecorderError> {
        self.inner
            .lock()
            .map_err(|_| RecorderError::Internal("recorder state lock poisoned".to_string()))
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RecorderPhase {
        self.lock()
            .map(|inner| inner.phase)
            .unwrap_or(RecorderPhase::Stopped)
    }

    /// Returns `true` while chunks are being collected.
    pub fn is_recording(&self) -> bool {
        self.phase() == RecorderPhase::Recording
    }

    /// Acquires devices and starts recording.
    ///
    /// # Errors
    /// - [`RecorderError::AlreadyStarted`] unless the recorder is idle.
    /// - Acquisition failures from [`MediaDevices::acquire`].
    /// - [`RecorderError::StoppedDuringStart`] when [`Recorder::stop`] ran while
    ///   acquisition was in flight; the stream is released before returning.
    pub async fn start(&self) -> Result<(), RecorderError> {
        {
            let mut inner = self.lock()?;
            if inner.phase != RecorderPhase::Idle {
                return Err(RecorderError::AlreadyStarted);
            }
            inner.phase = RecorderPhase::Starting;
        }

        // Leased before locking so every early return releases the devices.
        let acquired = self.devices.acquire().await.map(StreamLease::new);

        let mut inner = self.lock()?;
        match acquired {
            Err(error) => {
                inner.phase = RecorderPhase::Stopped;
                warn!(%error, "recorder acquisition failed");
                Err(error)
            }
            Ok(lease) => {
                if inner.stop_requested {
                    inner.phase = RecorderPhase::Stopped;
                    drop(lease);
                    info!("recorder stopped while starting; devices released");
                    return Err(RecorderError::StoppedDuringStart);
                }
                inner.lease = Some(lease);
                inner.phase = RecorderPhase::Recording;
                info!("recording started");
                Ok(())
            }
        }
    }

    /// Moves the chunk produced since the last call into the buffer.
    ///
    /// # Errors
    /// Propagates [`MediaStream::take_chunk`] failures; these are fatal to the
    /// session.
    pub fn collect_chunk(&self) -> Result<(), RecorderError> {
        let mut inner = self.lock()?;
        let RecorderInner { lease, chunks, .. } = &mut *inner;
        let Some(lease) = lease.as_mut() else {
            return Ok(());
        };
        match lease.stream_mut().take_chunk()? {
            Some(chunk) if !chunk.is_empty() => {
                debug!(bytes = chunk.len(), "recording chunk buffered");
                chunks.push(chunk);
            }
            _ => {}
        }
        Ok(())
    }

    /// Stops recording and returns the flushed recording with the lease that
    /// still holds the devices. Idempotent; a stop during start only marks the
    /// start for cancellation.
    fn take_for_stop(&self, now_ms: u64) -> Option<(RecordingArtifact, StreamLease)> {
        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(error) => {
                warn!(%error, "recorder stop could not lock state");
                return None;
            }
        };

        match inner.phase {
            RecorderPhase::Starting => {
                inner.stop_requested = true;
                None
            }
            RecorderPhase::Recording => {
                inner.phase = RecorderPhase::Stopped;
                let mut lease = inner.lease.take()?;
                let mut chunks = std::mem::take(&mut inner.chunks);
                match lease.stream_mut().take_chunk() {
                    Ok(Some(chunk)) if !chunk.is_empty() => chunks.push(chunk),
                    Ok(_) => {}
                    Err(error) => warn!(%error, "final chunk flush failed"),
                }
                let artifact = RecordingArtifact {
                    chunk_count: chunks.len(),
                    bytes: chunks.concat(),
                    mime_type: RECORDING_MIME_TYPE.to_string(),
                    created_at_ms: now_ms,
                };
                Some((artifact, lease))
            }
            RecorderPhase::Idle => {
                inner.phase = RecorderPhase::Stopped;
                None
            }
            RecorderPhase::Stopped => None,
        }
    }

    /// Stops recording without handing the recording off. Devices are released
    /// before returning.
    pub fn stop(&self, now_ms: u64) -> Option<RecordingArtifact> {
        self.take_for_stop(now_ms).map(|(artifact, lease)| {
            drop(lease);
            info!(chunks = artifact.chunk_count, "recording stopped");
            artifact
        })
    }

    /// Stops recording, hands the flushed recording to the evidence sink and
    /// then releases the devices. The lease is dropped on every path, including
    /// cancellation of this future.
    pub async fn stop_and_hand_off(
        &self,
        uploader: &EvidenceUploader,
        session_id: &str,
        now_ms: u64,
    ) -> Option<UploadOutcome> {
        let (artifact, lease) = self.take_for_stop(now_ms)?;
        info!(chunks = artifact.chunk_count, "recording stopped; handing off");
        let outcome = if artifact.chunk_count == 0 {
            None
        } else {
            let upload = EvidenceUpload::recording(
                session_id,
                artifact.created_at_ms,
                artifact.mime_type,
                artifact.bytes,
            );
            Some(uploader.upload(upload).await)
        };
        drop(lease);
        outcome
    }

    /// Read-only frame access for presence sampling and evidence capture.
    pub fn frames(&self) -> RecorderFrames {
        RecorderFrames {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view of the recorder's live frames.
#[derive(Clone)]
pub struct RecorderFrames {
    inner: Arc<Mutex<RecorderInner>>,
}

impl FrameSource for RecorderFrames {
    fn latest_frame(&self) -> Option<Frame> {
        let inner = self.inner.lock().ok()?;
        inner.lease.as_ref()?.stream().latest_frame()
    }
}

/// Recorder and device errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    /// The user or platform denied device access.
    #[error("device permission denied: {0}")]
    PermissionDenied(String),
    /// Another application holds the device.
    #[error("device busy: {0}")]
    DeviceBusy(String),
    /// `start` was called on a recorder that is not idle.
    #[error("recorder already started")]
    AlreadyStarted,
    /// `stop` ran while acquisition was in flight.
    #[error("recorder stopped during start")]
    StoppedDuringStart,
    /// The live stream failed while recording.
    #[error("media stream failed: {0}")]
    StreamFailed(String),
    /// Internal invariant breach.
    #[error("recorder internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for recorder lifecycle and chunk flushing.

    use super::*;

    #[tokio::test]
    async fn stop_flushes_buffered_chunks_and_releases() {
        let devices = Arc::new(SyntheticMediaDevices::new());
        let stats = devices.stats();
        let recorder = Recorder::new(devices);

        recorder.start().await.expect("start should work");
        recorder.collect_chunk().expect("chunk");
        recorder.collect_chunk().expect("chunk");

        let artifact = recorder.stop(9_000).expect("artifact expected");
        assert_eq!(artifact.chunk_count, 3);
        assert_eq!(artifact.mime_type, RECORDING_MIME_TYPE);
        assert_eq!(stats.released(), 1);
        assert!(recorder.stop(9_001).is_none());
        assert_eq!(stats.released(), 1);
    }

    #[tokio::test]
    async fn frames_disappear_after_stop() {
        let recorder = Recorder::new(Arc::new(SyntheticMediaDevices::new()));
        let frames = recorder.frames();
        assert!(frames.latest_frame().is_none());

        recorder.start().await.expect("start should work");
        assert!(frames.latest_frame().is_some());

        recorder.stop(0);
        assert!(frames.latest_frame().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poisoned_state_after_acquire_still_releases_devices() {
        let devices = Arc::new(SyntheticMediaDevices::with_acquire_delay(
            std::time::Duration::from_millis(50),
        ));
        let stats = devices.stats();
        let recorder = Recorder::new(devices);

        let starting = tokio::spawn({
            let recorder = recorder.clone();
            async move { recorder.start().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let inner = Arc::clone(&recorder.inner);
        let poisoned = std::thread::spawn(move || {
            let _guard = inner.lock().expect("lock should be free");
            panic!("poison the recorder state");
        })
        .join();
        assert!(poisoned.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let result = starting.await.expect("start task should join");

        assert!(matches!(result, Err(RecorderError::Internal(_))));
        assert_eq!(stats.acquired(), 1);
        assert_eq!(stats.outstanding(), 0);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let recorder = Recorder::new(Arc::new(SyntheticMediaDevices::new()));
        recorder.start().await.expect("start should work");
        assert_eq!(recorder.start().await, Err(RecorderError::AlreadyStarted));
    }
}
