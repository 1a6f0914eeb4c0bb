//! Integration tests for extended-display resolution classification.

use interview_guard_display::{
    DetectionMethod, DisplayGeometry, DisplayVerdict, classify_display,
    is_known_composite_resolution,
};

#[test]
fn extended_display_resolution_tests_flags_composite_desktops() {
    for (width, height) in [(3840, 1080), (3440, 1440), (5760, 1080)] {
        let verdict = classify_display(&DisplayGeometry::single_monitor(width, height));
        assert!(
            !verdict.is_compliant(),
            "{width}x{height} should be classified as extended"
        );
    }
}

#[test]
fn extended_display_resolution_tests_accepts_common_single_monitors() {
    for (width, height) in [(1920, 1080), (1366, 768)] {
        let verdict = classify_display(&DisplayGeometry::single_monitor(width, height));
        assert_eq!(verdict, DisplayVerdict::Compliant, "{width}x{height}");
    }
}

#[test]
fn extended_display_resolution_tests_aspect_ratio_matches_before_table() {
    assert!(is_known_composite_resolution(3840, 1080));
    assert_eq!(
        classify_display(&DisplayGeometry::single_monitor(3840, 1080)),
        DisplayVerdict::ExtendedDisplay(DetectionMethod::AspectRatio)
    );
}
