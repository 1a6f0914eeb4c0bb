#![warn(missing_docs)]
//! # interview-guard-session
//!
//! ## Purpose
//! The proctoring session controller: binds the display sentinel, presence
//! engine, evidence pipeline, recorder and full-screen enforcement into one
//! session with a warning count and a single termination decision.
//!
//! ## Responsibilities
//! - Gate session entry on the device check ([`run_device_check`]).
//! - Drive the `Idle -> Starting -> Active -> PausedForConfirmation -> Ended`
//!   state machine ([`SessionMachine`]).
//! - Escalate presence samples into violations and rate-limit them.
//! - Capture and hand off evidence without stalling monitoring.
//! - Release the recorder and full-screen together and notify the session-end
//!   collaborator exactly once ([`ProctoringSession::teardown`]).
//!
//! ## Data flow
//! Interval ticks, host signals and candidate commands arrive at one task
//! ([`ProctoringSession::run`]). It feeds them to the pure [`SessionMachine`],
//! captures evidence for recorded violations, spawns uploads and log writes
//! onto a `JoinSet`, and publishes a [`SessionSnapshot`] after every event.
//!
//! ## Ownership and lifetimes
//! The session task exclusively owns the machine, so the warning count and the
//! violation log have a single writer. Only the recorder may stop devices; the
//! presence engine and evidence capture read frames through a read-only view.
//!
//! ## Error model
//! [`SessionError`] covers the failure taxonomy; [`SessionError::severity`]
//! tells whether a failure ends the session, degrades a stage, or is only
//! logged. Nothing inside the monitoring loop propagates out of it.
//!
//! ## Security and privacy notes
//! Log fields carry the session id and violation ids, never frame bytes or the
//! candidate e-mail.

mod collaborators;
mod config;
mod error;
mod gate;
mod machine;
mod runtime;

pub use collaborators::{
    InMemoryViolationLog, RecordingNotifier, SessionEndNotifier, SessionEndReport,
    ViolationLogSink,
};
pub use config::SessionConfig;
pub use error::{SessionError, Severity};
pub use gate::run_device_check;
pub use machine::{EscalationPolicy, PauseCause, SessionMachine, SessionPhase, ViolationRecorded};
pub use runtime::{
    CandidateCommand, HostSignal, ProctoringSession, SessionContext, SessionDeps, SessionHandle,
    SessionSnapshot, SessionSummary,
};
