//! Integration tests for evidence endpoint transport checks.

use interview_guard_app::is_https_endpoint;

#[test]
fn transport_security_tests_requires_https() {
    assert!(is_https_endpoint("https://evidence.interview-guard.test/uploads"));
    assert!(!is_https_endpoint("http://evidence.interview-guard.test/uploads"));
    assert!(!is_https_endpoint("not a url"));
}
