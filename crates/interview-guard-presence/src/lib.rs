#![warn(missing_docs)]
//! # interview-guard-presence
//!
//! ## Purpose
//! Classifies live camera frames into presence categories.
//!
//! ## Responsibilities
//! - Define the [`PresenceClassifier`] capability so the heuristic can be
//!   replaced by a real vision model without touching the controller.
//! - Provide [`BrightnessHeuristic`], a luminance-region stand-in.
//! - Provide [`ScriptedClassifier`] for deterministic tests and demos.
//!
//! ## Data flow
//! Sampling tick -> latest [`Frame`] from the recorder stream ->
//! [`PresenceClassifier::classify`] -> [`PresenceSample`] consumed once by the
//! controller, which owns all escalation timing.
//!
//! ## Notes
//! The heuristic is not accurate and is not meant to be. Only the taxonomy and
//! the order in which rules are evaluated matter to callers.

use std::collections::VecDeque;

use interview_guard_core::{ConfidenceSignals, Frame, PresenceClassification, PresenceSample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Share of `min(width, height)` used as the face zone radius.
pub const FACE_ZONE_RADIUS_RATIO: f32 = 0.15;
/// Share of the frame height covered by each of the upper and lower bands.
pub const BAND_HEIGHT_RATIO: f32 = 0.3;

/// Capability that turns one frame into one presence sample.
pub trait PresenceClassifier: Send {
    /// Classifies a frame.
    fn classify(&mut self, frame: &Frame) -> PresenceSample;
}

/// Tunables for [`BrightnessHeuristic`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicThresholds {
    /// Face-zone luminance for a strong signal (T1).
    pub strong_face_luminance: f32,
    /// Minimum face-zone share of the frame for a strong signal.
    pub strong_zone_ratio: f32,
    /// Face-zone luminance for a weak signal (T2).
    pub weak_face_luminance: f32,
    /// Minimum face-zone share of the frame for a weak signal.
    pub weak_zone_ratio: f32,
    /// Lower band must exceed the upper band by this factor to count as
    /// looking down.
    pub looking_down_factor: f32,
    /// Upper-band luminance that may indicate a second person.
    pub crowded_upper_luminance: f32,
    /// Probability that a looking-down tick is surfaced as phone usage.
    pub phone_surface_probability: f64,
    /// Probability that a crowded upper band is surfaced as multiple people.
    pub multiple_people_probability: f64,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self {
            strong_face_luminance: 120.0,
            strong_zone_ratio: 0.05,
            weak_face_luminance: 80.0,
            weak_zone_ratio: 0.02,
            looking_down_factor: 1.3,
            crowded_upper_luminance: 140.0,
            phone_surface_probability: 0.05,
            multiple_people_probability: 0.01,
        }
    }
}

/// Computes average luminance for the face zone and both bands.
pub fn measure_regions(frame: &Frame) -> ConfidenceSignals {
    let width = frame.width as usize;
    let center_x = frame.width as f32 / 2.0;
    let center_y = frame.height as f32 / 2.0;
    let radius = frame.width.min(frame.height) as f32 * FACE_ZONE_RADIUS_RATIO;
    let radius_sq = radius * radius;
    let upper_limit = frame.height as f32 * BAND_HEIGHT_RATIO;
    let lower_limit = frame.height as f32 * (1.0 - BAND_HEIGHT_RATIO);

    let mut face = RegionSum::default();
    let mut upper = RegionSum::default();
    let mut lower = RegionSum::default();

    for (index, pixel) in frame.rgba.chunks_exact(4).enumerate() {
        let x = (index % width) as f32;
        let y = (index / width) as f32;
        let channel_sum = u32::from(pixel[0]) + u32::from(pixel[1]) + u32::from(pixel[2]);
        let luminance = channel_sum as f32 / 3.0;

        let dx = x - center_x;
        let dy = y - center_y;
        if dx * dx + dy * dy < radius_sq {
            face.add(luminance);
        }
        if y < upper_limit {
            upper.add(luminance);
        }
        if y > lower_limit {
            lower.add(luminance);
        }
    }

    let total_pixels = frame.pixel_count().max(1) as f32;
    ConfidenceSignals {
        face_luminance: face.average(),
        upper_luminance: upper.average(),
        lower_luminance: lower.average(),
        face_zone_ratio: face.count as f32 / total_pixels,
    }
}

#[derive(Debug, Default)]
struct RegionSum {
    total: f32,
    count: u64,
}

impl RegionSum {
    fn add(&mut self, luminance: f32) {
        self.total += luminance;
        self.count += 1;
    }

    fn average(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f32
        }
    }
}

/// Brightness-histogram stand-in for a person detector.
#[derive(Debug, Clone)]
pub struct BrightnessHeuristic {
    thresholds: HeuristicThresholds,
    rng: StdRng,
}

impl BrightnessHeuristic {
    /// Creates a heuristic with default thresholds and a seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self::with_thresholds(HeuristicThresholds::default(), seed)
    }

    /// Creates a heuristic with custom thresholds.
    pub fn with_thresholds(thresholds: HeuristicThresholds, seed: u64) -> Self {
        Self {
            thresholds,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns the active thresholds.
    pub fn thresholds(&self) -> &HeuristicThresholds {
        &self.thresholds
    }

    fn surfaces(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.random::<f64>() < probability
    }

    fn decide(&mut self, signals: &ConfidenceSignals) -> PresenceClassification {
        let t = self.thresholds;
        let strong = signals.face_luminance > t.strong_face_luminance
            && signals.face_zone_ratio > t.strong_zone_ratio;
        let weak = signals.face_luminance > t.weak_face_luminance
            && signals.face_zone_ratio > t.weak_zone_ratio;
        let looking_down =
            signals.lower_luminance > signals.upper_luminance * t.looking_down_factor;

        if strong && !looking_down {
            return PresenceClassification::SinglePersonPresent;
        }

        if weak && looking_down {
            // Only an occasional looking-down tick is surfaced; the rest still
            // count as present.
            return if self.surfaces(t.phone_surface_probability) {
                PresenceClassification::PhoneUsageSuspected
            } else {
                PresenceClassification::SinglePersonPresent
            };
        }

        if signals.upper_luminance > t.crowded_upper_luminance
            && self.surfaces(t.multiple_people_probability)
        {
            return PresenceClassification::MultiplePeopleSuspected;
        }

        if weak {
            return PresenceClassification::SinglePersonPresent;
        }

        PresenceClassification::LookingAway
    }
}

impl PresenceClassifier for BrightnessHeuristic {
    fn classify(&mut self, frame: &Frame) -> PresenceSample {
        let signals = measure_regions(frame);
        let classification = self.decide(&signals);
        PresenceSample {
            timestamp_ms: frame.captured_at_ms,
            classification,
            signals,
        }
    }
}

/// Classifier that replays a fixed script, repeating the last entry.
#[derive(Debug, Clone)]
pub struct ScriptedClassifier {
    script: VecDeque<PresenceClassification>,
    last: PresenceClassification,
}

impl ScriptedClassifier {
    /// Creates a classifier that always returns `classification`.
    pub fn constant(classification: PresenceClassification) -> Self {
        Self {
            script: VecDeque::new(),
            last: classification,
        }
    }

    /// Creates a classifier that replays `script` then repeats its last entry.
    /// An empty script behaves like `constant(SinglePersonPresent)`.
    pub fn new(script: Vec<PresenceClassification>) -> Self {
        Self {
            script: script.into(),
            last: PresenceClassification::SinglePersonPresent,
        }
    }
}

impl PresenceClassifier for ScriptedClassifier {
    fn classify(&mut self, frame: &Frame) -> PresenceSample {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        PresenceSample {
            timestamp_ms: frame.captured_at_ms,
            classification: self.last,
            signals: ConfidenceSignals::default(),
        }
    }
}
