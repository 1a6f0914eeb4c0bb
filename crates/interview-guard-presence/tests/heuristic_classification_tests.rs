//! Integration tests for brightness heuristic classification rules.

use interview_guard_core::{Frame, PresenceClassification};
use interview_guard_presence::{
    BrightnessHeuristic, HeuristicThresholds, PresenceClassifier, ScriptedClassifier,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Builds a grey frame with separate luminance for the top band, the middle
/// and the bottom band.
fn banded_frame(upper: u8, middle: u8, lower: u8) -> Frame {
    let mut rgba = Vec::with_capacity((WIDTH * HEIGHT * 4) as usize);
    for y in 0..HEIGHT {
        let value = if y < 144 {
            upper
        } else if y > 336 {
            lower
        } else {
            middle
        };
        for _ in 0..WIDTH {
            rgba.extend_from_slice(&[value, value, value, 255]);
        }
    }
    Frame::new("camera-test", WIDTH, HEIGHT, 5_000, rgba).expect("frame should be valid")
}

fn always_surfacing() -> BrightnessHeuristic {
    BrightnessHeuristic::with_thresholds(
        HeuristicThresholds {
            phone_surface_probability: 1.0,
            multiple_people_probability: 1.0,
            ..HeuristicThresholds::default()
        },
        1,
    )
}

#[test]
fn heuristic_classification_tests_dark_frame_looks_away() {
    let mut heuristic = BrightnessHeuristic::new(3);
    let sample = heuristic.classify(&banded_frame(10, 10, 10));

    assert_eq!(sample.classification, PresenceClassification::LookingAway);
    assert_eq!(sample.timestamp_ms, 5_000);
}

#[test]
fn heuristic_classification_tests_bright_face_zone_is_present() {
    let mut heuristic = BrightnessHeuristic::new(3);
    let sample = heuristic.classify(&banded_frame(150, 150, 150));

    assert_eq!(
        sample.classification,
        PresenceClassification::SinglePersonPresent
    );
    assert!(sample.signals.face_zone_ratio > 0.05);
}

#[test]
fn heuristic_classification_tests_bright_lower_band_surfaces_phone_usage() {
    let mut heuristic = always_surfacing();
    let sample = heuristic.classify(&banded_frame(50, 100, 200));
    assert_eq!(
        sample.classification,
        PresenceClassification::PhoneUsageSuspected
    );

    let mut quiet = BrightnessHeuristic::with_thresholds(
        HeuristicThresholds {
            phone_surface_probability: 0.0,
            ..HeuristicThresholds::default()
        },
        1,
    );
    assert_eq!(
        quiet.classify(&banded_frame(50, 100, 200)).classification,
        PresenceClassification::SinglePersonPresent
    );
}

#[test]
fn heuristic_classification_tests_bright_upper_band_surfaces_multiple_people() {
    let mut heuristic = always_surfacing();
    let sample = heuristic.classify(&banded_frame(200, 30, 30));

    assert_eq!(
        sample.classification,
        PresenceClassification::MultiplePeopleSuspected
    );
}

#[test]
fn heuristic_classification_tests_same_seed_replays_same_decisions() {
    let frame = banded_frame(50, 100, 200);
    let mut first = BrightnessHeuristic::new(42);
    let mut second = BrightnessHeuristic::new(42);

    for _ in 0..50 {
        assert_eq!(
            first.classify(&frame).classification,
            second.classify(&frame).classification
        );
    }
}

#[test]
fn heuristic_classification_tests_script_repeats_last_entry() {
    let frame = banded_frame(0, 0, 0);
    let mut scripted = ScriptedClassifier::new(vec![
        PresenceClassification::LookingAway,
        PresenceClassification::PhoneUsageSuspected,
    ]);

    let observed: Vec<_> = (0..4)
        .map(|_| scripted.classify(&frame).classification)
        .collect();
    assert_eq!(
        observed,
        vec![
            PresenceClassification::LookingAway,
            PresenceClassification::PhoneUsageSuspected,
            PresenceClassification::PhoneUsageSuspected,
            PresenceClassification::PhoneUsageSuspected,
        ]
    );
}
