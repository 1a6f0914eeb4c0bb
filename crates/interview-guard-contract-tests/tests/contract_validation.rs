//! Validates collaborator records against frozen JSON schemas.

use interview_guard_core::{EvidenceRef, TerminationReason, Violation, ViolationKind};
use interview_guard_session::SessionEndReport;
use jsonschema::JSONSchema;
use serde_json::{Value, json};

const VIOLATION_SCHEMA: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../contracts/violation-record.schema.json"
);
const REPORT_SCHEMA: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../contracts/session-end-report.schema.json"
);

fn load_json(path: &str) -> Value {
    let raw = std::fs::read_to_string(path).expect("json file should be readable");
    serde_json::from_str(&raw).expect("json file should be valid")
}

fn compile_validator(schema_path: &str) -> JSONSchema {
    let schema = load_json(schema_path);
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn violation_fixture_matches_schema() {
    let validator = compile_validator(VIOLATION_SCHEMA);
    let fixture = load_json(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/fixtures/violation-record.valid.json"
    ));
    assert!(
        validator.is_valid(&fixture),
        "violation fixture should validate against schema"
    );
}

#[test]
fn session_end_report_fixture_matches_schema() {
    let validator = compile_validator(REPORT_SCHEMA);
    let fixture = load_json(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../contracts/fixtures/session-end-report.valid.json"
    ));
    assert!(
        validator.is_valid(&fixture),
        "session end report fixture should validate against schema"
    );
}

#[test]
fn serialized_violations_match_schema_for_every_kind() {
    let validator = compile_validator(VIOLATION_SCHEMA);
    let kinds = [
        ViolationKind::LookingAway,
        ViolationKind::MultiplePeople,
        ViolationKind::PhoneUsage,
        ViolationKind::BackgroundActivity,
        ViolationKind::ExtendedDisplay,
        ViolationKind::FullscreenExit,
        ViolationKind::TabSwitch,
    ];

    for (index, kind) in kinds.into_iter().enumerate() {
        let violation = Violation {
            id: format!("violation-{index}"),
            kind,
            detected_at_ms: 1_700_000_000_000 + index as u64,
            evidence_ref: (index % 2 == 0).then(|| EvidenceRef(format!("local-{index}"))),
            detail: None,
        };
        let bytes = violation.to_json_bytes().expect("violation should serialize");
        let value: Value = serde_json::from_slice(&bytes).expect("bytes should be json");
        assert!(
            validator.is_valid(&value),
            "serialized {kind:?} violation should validate"
        );
    }
}

#[test]
fn serialized_session_end_report_matches_schema() {
    let validator = compile_validator(REPORT_SCHEMA);
    let report = SessionEndReport {
        session_id: "session-7".to_string(),
        warning_count: 5,
        termination_reason: TerminationReason::ViolationLimit,
        duration_seconds: 900,
    };
    let value = serde_json::to_value(&report).expect("report should serialize");
    assert!(validator.is_valid(&value));
}

#[test]
fn unknown_violation_kind_is_rejected() {
    let validator = compile_validator(VIOLATION_SCHEMA);
    let record = json!({
        "id": "violation-1",
        "kind": "cheating",
        "detected_at_ms": 1,
        "evidence_ref": null
    });
    assert!(!validator.is_valid(&record));
}
