//! Integration tests for log redaction.

use interview_guard_app::redact_candidate_email;

#[test]
fn log_redaction_tests_masks_local_part_of_candidate_email() {
    let redacted = redact_candidate_email("ada.lovelace@example.test");

    assert_eq!(redacted, "a***@example.test");
    assert!(!redacted.contains("lovelace"));
}

#[test]
fn log_redaction_tests_fully_masks_malformed_addresses() {
    assert_eq!(redact_candidate_email("not-an-address"), "<redacted>");
    assert_eq!(redact_candidate_email("@example.test"), "<redacted>");
    assert_eq!(redact_candidate_email(""), "<redacted>");
}
