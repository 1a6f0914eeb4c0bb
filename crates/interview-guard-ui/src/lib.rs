#![warn(missing_docs)]
//! # interview-guard-ui
//!
//! ## Purpose
//! Defines the candidate-facing projection of a proctored session.
//!
//! ## Responsibilities
//! - Represent recorder, full-screen and upload stage statuses.
//! - Queue warning dialogs one at a time and hold the exit confirmation.
//! - Render the countdown as `mm:ss`, frozen while a confirmation is open.
//! - Collect low-priority notices without interrupting an open dialog.
//!
//! ## Data flow
//! The session runtime mutates [`SessionView`] as controller transitions
//! happen and publishes clones of it to the embedding shell.
//!
//! ## Ownership and lifetimes
//! `SessionView` owns all strings so snapshots can cross task boundaries.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Out-of-order
//! acknowledgements are ignored.
//!
//! ## Security and privacy notes
//! The view never holds frame bytes, evidence bytes or the candidate e-mail.

use std::collections::VecDeque;

use interview_guard_core::ViolationKind;

/// Generic stage status used for recorder/full-screen/upload flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Healthy,
    /// Stage encountered non-fatal error.
    Degraded,
}

/// A blocking dialog shown to the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    /// Acknowledgement of one recorded violation.
    Warning {
        /// Violation being acknowledged.
        violation_id: String,
        /// Violation category.
        kind: ViolationKind,
        /// Warning count at detection time.
        warning_number: u32,
    },
    /// Exit confirmation after an exit attempt or end request.
    ExitConfirmation,
}

static EXIT_CONFIRMATION: Dialog = Dialog::ExitConfirmation;

/// Rendered text of a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogText {
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub body: String,
    /// Primary action label.
    pub confirm_label: &'static str,
    /// Secondary action label, if the dialog can be dismissed.
    pub cancel_label: Option<&'static str>,
}

impl Dialog {
    /// Renders the dialog text.
    pub fn text(&self) -> DialogText {
        match self {
            Self::Warning {
                kind,
                warning_number,
                ..
            } => DialogText {
                title: format!("Behavior Warning #{warning_number}"),
                body: format!(
                    "{}\n\nPlease maintain proper interview conduct. This incident has been \
                     recorded and logged. Multiple warnings may result in interview termination.",
                    kind.description()
                ),
                confirm_label: "I Understand",
                cancel_label: None,
            },
            Self::ExitConfirmation => DialogText {
                title: "Terminate Interview?".to_string(),
                body: "Are you sure you want to terminate the interview? This action cannot be \
                       undone and your interview session will be permanently ended. All \
                       recordings and data will be saved."
                    .to_string(),
                confirm_label: "Yes, End Interview",
                cancel_label: Some("No, Continue Interview"),
            },
        }
    }
}

/// Low-priority, non-blocking message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Message text.
    pub message: String,
    /// Creation time in Unix epoch milliseconds.
    pub created_at_ms: u64,
}

/// Aggregate candidate-facing session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Recorder stage status.
    pub recorder: StageStatus,
    /// Full-screen stage status.
    pub fullscreen: StageStatus,
    /// Evidence upload stage status.
    pub upload: StageStatus,
    /// Countdown text.
    pub countdown: String,
    /// Recorded warnings.
    pub warning_count: u32,
    /// Message shown when the session ended on a fatal failure.
    pub fatal_message: Option<String>,
    countdown_frozen: bool,
    confirmation_open: bool,
    warnings: VecDeque<Dialog>,
    notices: Vec<Notice>,
}

impl SessionView {
    /// Creates the initial view for a session of `session_length_secs`.
    pub fn new(version: impl Into<String>, session_length_secs: u64) -> Self {
        Self {
            version: version.into(),
            recorder: StageStatus::Idle,
            fullscreen: StageStatus::Idle,
            upload: StageStatus::Idle,
            countdown: format_countdown(session_length_secs),
            warning_count: 0,
            fatal_message: None,
            countdown_frozen: false,
            confirmation_open: false,
            warnings: VecDeque::new(),
            notices: Vec::new(),
        }
    }

    /// Updates the countdown text unless it is frozen.
    pub fn set_remaining(&mut self, remaining_secs: u64) {
        if !self.countdown_frozen {
            self.countdown = format_countdown(remaining_secs);
        }
    }

    /// Returns `true` while the countdown display is frozen.
    pub fn is_countdown_frozen(&self) -> bool {
        self.countdown_frozen
    }

    /// Queues a warning dialog and updates the count.
    pub fn push_warning(
        &mut self,
        violation_id: impl Into<String>,
        kind: ViolationKind,
        warning_number: u32,
    ) {
        self.warning_count = self.warning_count.max(warning_number);
        self.warnings.push_back(Dialog::Warning {
            violation_id: violation_id.into(),
            kind,
            warning_number,
        });
    }

    /// Dismisses the front warning. Returns the dismissed dialog.
    pub fn acknowledge_warning(&mut self) -> Option<Dialog> {
        self.warnings.pop_front()
    }

    /// Number of warnings still waiting for acknowledgement.
    pub fn pending_warnings(&self) -> usize {
        self.warnings.len()
    }

    /// Opens the exit confirmation and freezes the countdown display.
    pub fn open_exit_confirmation(&mut self) {
        self.confirmation_open = true;
        self.countdown_frozen = true;
    }

    /// Closes the exit confirmation and resumes the countdown display.
    pub fn close_exit_confirmation(&mut self, remaining_secs: u64) {
        self.confirmation_open = false;
        self.countdown_frozen = false;
        self.set_remaining(remaining_secs);
    }

    /// The dialog currently shown. The exit confirmation takes precedence over
    /// queued warnings.
    pub fn current_dialog(&self) -> Option<&Dialog> {
        if self.confirmation_open {
            return Some(&EXIT_CONFIRMATION);
        }
        self.warnings.front()
    }

    /// Adds a low-priority notice.
    pub fn push_notice(&mut self, message: impl Into<String>, created_at_ms: u64) {
        self.notices.push(Notice {
            message: message.into(),
            created_at_ms,
        });
    }

    /// Notices in arrival order.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Closes every dialog and shows a fatal message.
    pub fn show_fatal(&mut self, message: impl Into<String>) {
        self.confirmation_open = false;
        self.warnings.clear();
        self.fatal_message = Some(message.into());
    }

    /// Closes every dialog once the session is over.
    pub fn close_all(&mut self) {
        self.confirmation_open = false;
        self.countdown_frozen = true;
        self.warnings.clear();
    }
}

/// Formats seconds as `mm:ss`. Minutes are not wrapped into hours.
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
