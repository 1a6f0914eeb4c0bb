//! Synthetic capture devices for tests, demos and headless runs.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use interview_guard_core::Frame;

use crate::{DeviceKind, MediaDevices, MediaStream, RecorderError};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const CHUNK_LEN: usize = 64;

/// Acquisition and release counters shared with every synthetic stream.
#[derive(Debug, Default)]
pub struct DeviceStats {
    acquired: AtomicU32,
    released: AtomicU32,
}

impl DeviceStats {
    /// Streams handed out.
    pub fn acquired(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Streams whose tracks were stopped.
    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }

    /// Streams currently holding devices.
    pub fn outstanding(&self) -> u32 {
        self.acquired().saturating_sub(self.released())
    }
}

/// Synthetic [`MediaDevices`] with controllable availability, latency and
/// frame content.
#[derive(Debug)]
pub struct SyntheticMediaDevices {
    camera_available: AtomicBool,
    microphone_available: AtomicBool,
    acquire_delay: Duration,
    acquire_failure: Mutex<Option<RecorderError>>,
    stream_failing: Arc<AtomicBool>,
    frame: Arc<Mutex<Option<Frame>>>,
    stats: Arc<DeviceStats>,
}

impl SyntheticMediaDevices {
    /// Creates devices that grant access immediately and stream a mid-grey
    /// 640x480 frame.
    pub fn new() -> Self {
        Self::with_acquire_delay(Duration::ZERO)
    }

    /// Creates devices whose acquisition takes `acquire_delay`.
    pub fn with_acquire_delay(acquire_delay: Duration) -> Self {
        let frame = Frame::filled(
            "synthetic-camera",
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            0,
            [128, 128, 128, 255],
        )
        .ok();
        Self {
            camera_available: AtomicBool::new(true),
            microphone_available: AtomicBool::new(true),
            acquire_delay,
            acquire_failure: Mutex::new(None),
            stream_failing: Arc::new(AtomicBool::new(false)),
            frame: Arc::new(Mutex::new(frame)),
            stats: Arc::new(DeviceStats::default()),
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }

    /// Makes probes of `kind` fail with a permission error.
    pub fn deny(&self, kind: DeviceKind) {
        match kind {
            DeviceKind::Camera => self.camera_available.store(false, Ordering::SeqCst),
            DeviceKind::Microphone => self.microphone_available.store(false, Ordering::SeqCst),
        }
    }

    /// Makes the next acquisition fail with `error`.
    pub fn fail_next_acquire(&self, error: RecorderError) {
        if let Ok(mut failure) = self.acquire_failure.lock() {
            *failure = Some(error);
        }
    }

    /// Makes live streams fail their next chunk read.
    pub fn break_stream(&self) {
        self.stream_failing.store(true, Ordering::SeqCst);
    }

    /// Replaces the frame every stream reports.
    pub fn set_frame(&self, frame: Frame) {
        if let Ok(mut current) = self.frame.lock() {
            *current = Some(frame);
        }
    }
}

impl Default for SyntheticMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for SyntheticMediaDevices {
    async fn probe(&self, kind: DeviceKind) -> Result<(), RecorderError> {
        let available = match kind {
            DeviceKind::Camera => self.camera_available.load(Ordering::SeqCst),
            DeviceKind::Microphone => self.microphone_available.load(Ordering::SeqCst),
        };
        if available {
            Ok(())
        } else {
            Err(RecorderError::PermissionDenied(format!("{kind:?} access denied")))
        }
    }

    async fn acquire(&self) -> Result<Box<dyn MediaStream>, RecorderError> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }

        let scripted = self
            .acquire_failure
            .lock()
            .map_err(|_| RecorderError::Internal("acquire failure lock poisoned".to_string()))?
            .take();
        if let Some(error) = scripted {
            return Err(error);
        }

        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticStream {
            frame: Arc::clone(&self.frame),
            failing: Arc::clone(&self.stream_failing),
            stats: Arc::clone(&self.stats),
            sequence: 0,
            released: false,
        }))
    }
}

struct SyntheticStream {
    frame: Arc<Mutex<Option<Frame>>>,
    failing: Arc<AtomicBool>,
    stats: Arc<DeviceStats>,
    sequence: u8,
    released: bool,
}

impl MediaStream for SyntheticStream {
    fn latest_frame(&self) -> Option<Frame> {
        if self.released {
            return None;
        }
        self.frame.lock().ok()?.clone()
    }

    fn take_chunk(&mut self) -> Result<Option<Vec<u8>>, RecorderError> {
        if self.released {
            return Ok(None);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RecorderError::StreamFailed("synthetic track ended".to_string()));
        }
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(vec![self.sequence; CHUNK_LEN]))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
