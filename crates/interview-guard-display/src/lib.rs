#![warn(missing_docs)]
//! # interview-guard-display
//!
//! ## Purpose
//! Detects evidence of more than one active display surface.
//!
//! ## Responsibilities
//! - Define a backend-agnostic [`DisplayProbe`] capability.
//! - Classify a [`DisplayGeometry`] snapshot with an ordered list of
//!   heuristics, first match wins.
//! - Track configuration changes between polls for audit.
//! - Provide a deterministic [`SyntheticDisplayProbe`] for CI and demos.
//!
//! ## Data flow
//! Controller poll -> [`DisplaySentinel::poll`] -> probe snapshot ->
//! [`classify_display`] -> [`DisplayReport`] consumed by the controller.
//!
//! ## Error model
//! Probe failures surface as [`DisplayError`]. [`DisplaySentinel::check_single_display`]
//! fails closed and reports a probe failure as non-compliant.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Aspect ratio above which a desktop is treated as side-by-side monitors.
pub const MAX_SINGLE_ASPECT_RATIO: f64 = 1.8;
/// Widest resolution accepted for a single monitor.
pub const SINGLE_MONITOR_MAX_WIDTH: u32 = 2560;
/// Wide-but-not-ultrawide width threshold.
pub const WIDE_WIDTH_THRESHOLD: u32 = 2048;
/// Aspect ratio that combined with a wide width flags an extended desktop.
pub const WIDE_ASPECT_RATIO: f64 = 1.6;
/// Tolerance for window origins left of or above the primary display.
pub const WINDOW_ORIGIN_TOLERANCE_PX: i64 = 100;
/// Largest accepted gap between total and available display area.
pub const AVAILABLE_AREA_TOLERANCE_PX: u32 = 200;

/// Composite resolutions produced by common dual and triple monitor setups.
pub const KNOWN_COMPOSITE_RESOLUTIONS: &[(u32, u32)] = &[
    (3840, 1080),
    (3840, 1200),
    (2560, 1080),
    (3200, 1080),
    (3520, 1080),
    (3360, 1080),
    (3000, 1080),
    (3440, 1440),
    (5760, 1080),
    (4480, 1080),
    (3072, 1080),
    (2880, 1080),
    (4096, 1080),
    (3600, 1080),
    (2736, 1080),
];

/// Snapshot of the display environment as seen by the session window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    /// Total display width in pixels.
    pub width: u32,
    /// Total display height in pixels.
    pub height: u32,
    /// Width available to windows.
    pub avail_width: u32,
    /// Height available to windows.
    pub avail_height: u32,
    /// Window origin x relative to the primary display.
    pub window_x: i32,
    /// Window origin y relative to the primary display.
    pub window_y: i32,
    /// Screen count from a multi-display enumeration capability, when present.
    pub enumerated_screens: Option<u32>,
}

impl DisplayGeometry {
    /// Geometry of a single monitor with a 40px taskbar and the window at the
    /// origin.
    pub fn single_monitor(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            avail_width: width,
            avail_height: height.saturating_sub(40),
            window_x: 0,
            window_y: 0,
            enumerated_screens: None,
        }
    }

    /// Width divided by height; infinite for a zero height.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return f64::INFINITY;
        }
        f64::from(self.width) / f64::from(self.height)
    }

    /// Compact `WxH` summary for audit records.
    pub fn summary(&self) -> String {
        format!(
            "{}x{} avail={}x{} window=({},{})",
            self.width,
            self.height,
            self.avail_width,
            self.avail_height,
            self.window_x,
            self.window_y
        )
    }
}

/// Heuristic that flagged an extended display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Multi-display enumeration reported more than one screen.
    ScreenEnumeration,
    /// Aspect ratio above [`MAX_SINGLE_ASPECT_RATIO`].
    AspectRatio,
    /// Resolution matches [`KNOWN_COMPOSITE_RESOLUTIONS`].
    CompositeResolution,
    /// Width beyond single-monitor limits.
    UnusualWidth,
    /// Window origin outside the primary display.
    WindowPosition,
    /// Total and available area disagree.
    AvailableAreaDiscrepancy,
    /// The probe itself failed.
    ProbeFailure,
}

impl DetectionMethod {
    /// Stable label used in audit records.
    pub fn label(self) -> &'static str {
        match self {
            Self::ScreenEnumeration => "screen_enumeration",
            Self::AspectRatio => "aspect_ratio",
            Self::CompositeResolution => "composite_resolution",
            Self::UnusualWidth => "unusual_width",
            Self::WindowPosition => "window_position",
            Self::AvailableAreaDiscrepancy => "available_area_discrepancy",
            Self::ProbeFailure => "probe_failure",
        }
    }
}

/// Outcome of classifying one geometry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayVerdict {
    /// Exactly one display surface.
    Compliant,
    /// Extended display, with the heuristic that matched first.
    ExtendedDisplay(DetectionMethod),
}

impl DisplayVerdict {
    /// Returns `true` for [`DisplayVerdict::Compliant`].
    pub fn is_compliant(self) -> bool {
        matches!(self, Self::Compliant)
    }
}

/// Returns `true` when `(width, height)` is a known composite resolution.
pub fn is_known_composite_resolution(width: u32, height: u32) -> bool {
    KNOWN_COMPOSITE_RESOLUTIONS
        .iter()
        .any(|&(w, h)| w == width && h == height)
}

/// Classifies one geometry snapshot. Heuristics run in priority order and the
/// first positive match short-circuits.
pub fn classify_display(geometry: &DisplayGeometry) -> DisplayVerdict {
    if geometry.enumerated_screens.is_some_and(|count| count > 1) {
        return DisplayVerdict::ExtendedDisplay(DetectionMethod::ScreenEnumeration);
    }

    let aspect = geometry.aspect_ratio();
    if aspect > MAX_SINGLE_ASPECT_RATIO {
        return DisplayVerdict::ExtendedDisplay(DetectionMethod::AspectRatio);
    }

    if is_known_composite_resolution(geometry.width, geometry.height) {
        return DisplayVerdict::ExtendedDisplay(DetectionMethod::CompositeResolution);
    }

    if geometry.width > SINGLE_MONITOR_MAX_WIDTH
        || (geometry.width > WIDE_WIDTH_THRESHOLD && aspect > WIDE_ASPECT_RATIO)
    {
        return DisplayVerdict::ExtendedDisplay(DetectionMethod::UnusualWidth);
    }

    let x = i64::from(geometry.window_x);
    let y = i64::from(geometry.window_y);
    if x < -WINDOW_ORIGIN_TOLERANCE_PX
        || x >= i64::from(geometry.width)
        || y < -WINDOW_ORIGIN_TOLERANCE_PX
        || y >= i64::from(geometry.height)
    {
        return DisplayVerdict::ExtendedDisplay(DetectionMethod::WindowPosition);
    }

    if geometry.width.abs_diff(geometry.avail_width) > AVAILABLE_AREA_TOLERANCE_PX
        || geometry.height.abs_diff(geometry.avail_height) > AVAILABLE_AREA_TOLERANCE_PX
    {
        return DisplayVerdict::ExtendedDisplay(DetectionMethod::AvailableAreaDiscrepancy);
    }

    DisplayVerdict::Compliant
}

/// Capability that snapshots the current display environment.
pub trait DisplayProbe: Send + Sync {
    /// Reads the current display geometry.
    ///
    /// # Errors
    /// Returns [`DisplayError::Probe`] when the environment cannot be read.
    fn snapshot(&self) -> Result<DisplayGeometry, DisplayError>;
}

/// Result of one sentinel poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayReport {
    /// Geometry that was classified.
    pub geometry: DisplayGeometry,
    /// Classification outcome.
    pub verdict: DisplayVerdict,
    /// `true` when the geometry differs from the previous poll.
    pub config_changed: bool,
}

/// Polls a [`DisplayProbe`] and remembers the last seen configuration.
#[derive(Clone)]
pub struct DisplaySentinel {
    probe: Arc<dyn DisplayProbe>,
    last_geometry: Option<DisplayGeometry>,
}

impl DisplaySentinel {
    /// Creates a sentinel over the given probe.
    pub fn new(probe: Arc<dyn DisplayProbe>) -> Self {
        Self {
            probe,
            last_geometry: None,
        }
    }

    /// Takes one snapshot and classifies it.
    ///
    /// # Errors
    /// Propagates probe failures unchanged.
    pub fn poll(&mut self) -> Result<DisplayReport, DisplayError> {
        let geometry = self.probe.snapshot()?;
        let config_changed = self
            .last_geometry
            .as_ref()
            .is_some_and(|previous| previous != &geometry);
        if config_changed {
            info!(
                geometry = %geometry.summary(),
                "screen configuration changed"
            );
        }

        let verdict = classify_display(&geometry);
        if let DisplayVerdict::ExtendedDisplay(method) = verdict {
            warn!(
                method = method.label(),
                geometry = %geometry.summary(),
                "extended display detected"
            );
        }

        self.last_geometry = Some(geometry.clone());
        Ok(DisplayReport {
            geometry,
            verdict,
            config_changed,
        })
    }

    /// One-shot compliance check used by the device-check gate.
    ///
    /// Returns `false` when the probe fails.
    pub fn check_single_display(&mut self) -> bool {
        match self.poll() {
            Ok(report) => report.verdict.is_compliant(),
            Err(error) => {
                warn!(
                    method = DetectionMethod::ProbeFailure.label(),
                    %error,
                    "display probe failed; treating as non-compliant"
                );
                false
            }
        }
    }
}

/// Deterministic probe whose geometry can be swapped at runtime.
#[derive(Debug)]
pub struct SyntheticDisplayProbe {
    geometry: Mutex<Result<DisplayGeometry, String>>,
}

impl SyntheticDisplayProbe {
    /// Creates a probe reporting the given geometry.
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry: Mutex::new(Ok(geometry)),
        }
    }

    /// Replaces the reported geometry.
    pub fn set_geometry(&self, geometry: DisplayGeometry) {
        if let Ok(mut slot) = self.geometry.lock() {
            *slot = Ok(geometry);
        }
    }

    /// Makes subsequent snapshots fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.geometry.lock() {
            *slot = Err(reason.into());
        }
    }
}

impl Default for SyntheticDisplayProbe {
    fn default() -> Self {
        Self::new(DisplayGeometry::single_monitor(1920, 1080))
    }
}

impl DisplayProbe for SyntheticDisplayProbe {
    fn snapshot(&self) -> Result<DisplayGeometry, DisplayError> {
        let slot = self
            .geometry
            .lock()
            .map_err(|_| DisplayError::Probe("synthetic geometry lock poisoned".to_string()))?;
        slot.clone().map_err(DisplayError::Probe)
    }
}

/// Display layer error type.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Probe could not read the environment.
    #[error("display probe failure: {0}")]
    Probe(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for heuristic priority and change tracking.

    use super::*;

    #[test]
    fn enumeration_wins_over_everything() {
        let mut geometry = DisplayGeometry::single_monitor(1920, 1080);
        geometry.enumerated_screens = Some(2);
        assert_eq!(
            classify_display(&geometry),
            DisplayVerdict::ExtendedDisplay(DetectionMethod::ScreenEnumeration)
        );
    }

    #[test]
    fn unusual_width_catches_tall_wide_desktops() {
        let geometry = DisplayGeometry::single_monitor(2880, 1800);
        assert_eq!(
            classify_display(&geometry),
            DisplayVerdict::ExtendedDisplay(DetectionMethod::UnusualWidth)
        );
    }

    #[test]
    fn window_far_left_is_flagged() {
        let mut geometry = DisplayGeometry::single_monitor(1920, 1080);
        geometry.window_x = -101;
        assert_eq!(
            classify_display(&geometry),
            DisplayVerdict::ExtendedDisplay(DetectionMethod::WindowPosition)
        );

        geometry.window_x = -100;
        assert!(classify_display(&geometry).is_compliant());
    }

    #[test]
    fn available_area_gap_is_flagged() {
        let mut geometry = DisplayGeometry::single_monitor(1920, 1080);
        geometry.avail_height = 800;
        assert_eq!(
            classify_display(&geometry),
            DisplayVerdict::ExtendedDisplay(DetectionMethod::AvailableAreaDiscrepancy)
        );
    }

    #[test]
    fn sentinel_reports_configuration_changes() {
        let probe = Arc::new(SyntheticDisplayProbe::default());
        let mut sentinel = DisplaySentinel::new(probe.clone());

        let first = sentinel.poll().expect("poll should work");
        assert!(!first.config_changed);

        probe.set_geometry(DisplayGeometry::single_monitor(1366, 768));
        let second = sentinel.poll().expect("poll should work");
        assert!(second.config_changed);
        assert!(second.verdict.is_compliant());
    }

    #[test]
    fn probe_failure_fails_closed() {
        let probe = Arc::new(SyntheticDisplayProbe::default());
        probe.fail_with("permission denied");
        let mut sentinel = DisplaySentinel::new(probe);
        assert!(!sentinel.check_single_display());
    }
}
