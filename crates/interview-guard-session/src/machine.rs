//! Pure controller state machine.
//!
//! Holds the phase, the session state and the violation log. Every mutation
//! of the warning count and the log happens here; the async runtime only feeds
//! it events and carries out the returned effects.

use interview_guard_core::{
    EvidenceRef, PresenceClassification, SessionState, TerminationReason, Violation,
    ViolationKind, ViolationLog,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SessionError;

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Mounted, nothing acquired.
    Idle,
    /// Recorder and full-screen acquisition in flight.
    Starting,
    /// Monitoring.
    Active,
    /// Exit confirmation open.
    PausedForConfirmation,
    /// Terminal.
    Ended(TerminationReason),
}

/// Why the session was paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseCause {
    /// The candidate tried to leave full-screen.
    ExitAttempt,
    /// The candidate asked to end the interview.
    EndRequested,
}

/// Presence escalation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Continuous away time before a `LookingAway` violation.
    pub away_threshold_ms: u64,
    /// Minimum spacing of `PhoneUsage` violations.
    pub phone_usage_cooldown_ms: u64,
    /// Minimum spacing of `MultiplePeople` violations.
    pub multiple_people_cooldown_ms: u64,
}

/// Result of appending one violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationRecorded {
    /// The stored violation.
    pub violation: Violation,
    /// Warning count after the append.
    pub warning_number: u32,
    /// Set when this violation ended the session.
    pub ended: Option<TerminationReason>,
}

/// Controller state machine.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    phase: SessionPhase,
    pause_cause: Option<PauseCause>,
    state: SessionState,
    log: ViolationLog,
    policy: EscalationPolicy,
    max_warnings: u32,
}

impl SessionMachine {
    /// Creates an idle machine.
    pub fn new(state: SessionState, policy: EscalationPolicy, max_warnings: u32) -> Self {
        Self {
            phase: SessionPhase::Idle,
            pause_cause: None,
            state,
            log: ViolationLog::new(),
            policy,
            max_warnings,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Cause of the current pause, if paused.
    pub fn pause_cause(&self) -> Option<PauseCause> {
        self.pause_cause
    }

    /// Session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Violation log.
    pub fn log(&self) -> &ViolationLog {
        &self.log
    }

    /// Returns `true` once the session has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, SessionPhase::Ended(_))
    }

    /// Returns `true` while new violations are recorded.
    pub fn accepts_violations(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// `Idle -> Starting`.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] from any other phase.
    pub fn begin_start(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::InvalidTransition(format!(
                "cannot start from {:?}",
                self.phase
            )));
        }
        self.phase = SessionPhase::Starting;
        Ok(())
    }

    /// `Starting -> Active`.
    pub fn start_succeeded(&mut self) -> bool {
        self.transition_from(SessionPhase::Starting, SessionPhase::Active)
    }

    /// `Starting -> Ended(Error)`.
    pub fn start_failed(&mut self) -> bool {
        self.phase == SessionPhase::Starting && self.end(TerminationReason::Error)
    }

    /// `Active -> PausedForConfirmation`. Clears the away interval so time
    /// spent in the dialog never counts as looking away.
    pub fn request_pause(&mut self, cause: PauseCause) -> bool {
        if !self.transition_from(SessionPhase::Active, SessionPhase::PausedForConfirmation) {
            return false;
        }
        self.pause_cause = Some(cause);
        self.state.looking_away_since_ms = None;
        true
    }

    /// `PausedForConfirmation -> Active`.
    pub fn cancel_pause(&mut self) -> bool {
        if !self.transition_from(SessionPhase::PausedForConfirmation, SessionPhase::Active) {
            return false;
        }
        self.pause_cause = None;
        true
    }

    /// `PausedForConfirmation -> Ended(ManualExit)`.
    pub fn confirm_exit(&mut self) -> bool {
        self.phase == SessionPhase::PausedForConfirmation && self.end(TerminationReason::ManualExit)
    }

    /// Timer reached zero. Ends from `Active` or `PausedForConfirmation`.
    pub fn timer_expired(&mut self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Active | SessionPhase::PausedForConfirmation
        ) && self.end(TerminationReason::Timeout)
    }

    /// Fatal failure from any non-terminal phase.
    pub fn fail(&mut self) -> bool {
        self.end(TerminationReason::Error)
    }

    /// Ends a live session because its view went away.
    pub fn abandon(&mut self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Active | SessionPhase::PausedForConfirmation | SessionPhase::Starting
        ) && self.end(TerminationReason::ManualExit)
    }

    /// Copies the countdown into the session state.
    pub fn sync_clock(&mut self, elapsed_seconds: u64, remaining_seconds: u64) {
        self.state.sync_clock(elapsed_seconds, remaining_seconds);
    }

    /// Escalates one presence classification. Returns the violation kind to
    /// record, if any. Only evaluated while `Active`.
    pub fn assess_presence(
        &mut self,
        classification: PresenceClassification,
        now_ms: u64,
    ) -> Option<ViolationKind> {
        if !self.accepts_violations() {
            return None;
        }
        let state = &mut self.state;

        if classification.is_present() {
            state.looking_away_since_ms = None;
        }

        match classification {
            PresenceClassification::SinglePersonPresent => None,
            PresenceClassification::LookingAway => {
                let since = *state.looking_away_since_ms.get_or_insert(now_ms);
                if now_ms.saturating_sub(since) > self.policy.away_threshold_ms {
                    state.looking_away_since_ms = Some(now_ms);
                    Some(ViolationKind::LookingAway)
                } else {
                    None
                }
            }
            PresenceClassification::PhoneUsageSuspected => rate_limited(
                &mut state.last_phone_usage_ms,
                now_ms,
                self.policy.phone_usage_cooldown_ms,
            )
            .then_some(ViolationKind::PhoneUsage),
            PresenceClassification::MultiplePeopleSuspected => rate_limited(
                &mut state.last_multiple_people_ms,
                now_ms,
                self.policy.multiple_people_cooldown_ms,
            )
            .then_some(ViolationKind::MultiplePeople),
        }
    }

    /// Appends one violation while `Active` and applies its consequences.
    ///
    /// `ExtendedDisplay` always ends the session with `DisplayViolation`;
    /// reaching the warning limit ends it with `ViolationLimit`.
    pub fn record_violation(
        &mut self,
        kind: ViolationKind,
        detected_at_ms: u64,
        evidence_ref: Option<EvidenceRef>,
        detail: Option<String>,
    ) -> Option<ViolationRecorded> {
        if !self.accepts_violations() {
            debug!(
                kind = kind.label(),
                phase = ?self.phase,
                "violation ignored outside active phase"
            );
            return None;
        }

        let violation = self
            .log
            .append(Violation {
                id: Uuid::new_v4().to_string(),
                kind,
                detected_at_ms,
                evidence_ref,
                detail,
            })
            .clone();
        self.state.warning_count = u32::try_from(self.log.len()).unwrap_or(u32::MAX);
        let warning_number = self.state.warning_count;

        let ended = if kind == ViolationKind::ExtendedDisplay {
            self.end(TerminationReason::DisplayViolation)
                .then_some(TerminationReason::DisplayViolation)
        } else if warning_number >= self.max_warnings {
            self.end(TerminationReason::ViolationLimit)
                .then_some(TerminationReason::ViolationLimit)
        } else {
            None
        };

        Some(ViolationRecorded {
            violation,
            warning_number,
            ended,
        })
    }

    fn transition_from(&mut self, from: SessionPhase, to: SessionPhase) -> bool {
        if self.phase != from {
            return false;
        }
        debug!(?from, ?to, "session transition");
        self.phase = to;
        true
    }

    fn end(&mut self, reason: TerminationReason) -> bool {
        if self.is_ended() || !self.state.terminate(reason) {
            return false;
        }
        self.phase = SessionPhase::Ended(reason);
        self.pause_cause = None;
        info!(
            session_id = %self.state.session_id,
            ?reason,
            warning_count = self.state.warning_count,
            "session ended"
        );
        true
    }
}

fn rate_limited(last_fired_ms: &mut Option<u64>, now_ms: u64, cooldown_ms: u64) -> bool {
    let ready = last_fired_ms.is_none_or(|last| now_ms.saturating_sub(last) >= cooldown_ms);
    if ready {
        *last_fired_ms = Some(now_ms);
    }
    ready
}
