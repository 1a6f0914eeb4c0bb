//! Async controller runtime.
//!
//! One task owns every component and `select!`s over the countdown, the
//! display and presence cadences, the recorder chunk cadence, host signals,
//! candidate commands and the in-flight evidence work. Handlers are
//! synchronous per tick except where a host capability must be awaited, so a
//! violation and its capture are sequenced before the next sample while
//! uploads run in the background.

use std::sync::Arc;

use interview_guard_core::{
    CandidateIdentity, DeviceCheckResult, SessionState, Violation, ViolationKind,
};
use interview_guard_display::{DisplayProbe, DisplaySentinel, DisplayVerdict};
use interview_guard_evidence::{
    EvidenceCapture, EvidenceSink, EvidenceUpload, EvidenceUploader, FrameSource,
    LocalEvidenceStore, UploadOutcome,
};
use interview_guard_fullscreen::{FullscreenEnforcer, FullscreenHost, Key, KeyDisposition};
use interview_guard_presence::PresenceClassifier;
use interview_guard_recorder::{MediaDevices, Recorder, RecorderFrames, SessionTimer, TimerTick};
use interview_guard_ui::{SessionView, StageStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, error, info, warn};

use crate::collaborators::{SessionEndNotifier, SessionEndReport, ViolationLogSink};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::machine::{PauseCause, SessionMachine, SessionPhase};

/// Capabilities a session runs against.
pub struct SessionDeps {
    /// Camera and microphone.
    pub devices: Arc<dyn MediaDevices>,
    /// Display environment.
    pub display_probe: Arc<dyn DisplayProbe>,
    /// Host window.
    pub fullscreen_host: Arc<dyn FullscreenHost>,
    /// Presence classifier.
    pub classifier: Box<dyn PresenceClassifier>,
    /// External evidence storage.
    pub evidence_sink: Arc<dyn EvidenceSink>,
    /// Local retention for evidence the sink rejected.
    pub local_store: Arc<LocalEvidenceStore>,
    /// Violation persistence.
    pub violation_log: Arc<dyn ViolationLogSink>,
    /// End-of-session collaborator.
    pub notifier: Arc<dyn SessionEndNotifier>,
}

/// Who is interviewed, and when.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Candidate identity from the identity provider.
    pub identity: CandidateIdentity,
    /// Session identifier.
    pub session_id: String,
    /// Start time in Unix epoch milliseconds.
    pub started_at_ms: u64,
    /// Version shown in the session view.
    pub app_version: String,
}

/// Events raised by the host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// A key was pressed.
    Key(Key),
    /// Full-screen mode changed.
    FullscreenChanged(bool),
    /// The session window was hidden or lost focus.
    VisibilityLost,
}

/// Candidate and embedder requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateCommand {
    /// Open the exit confirmation.
    RequestEnd,
    /// Confirm the exit confirmation.
    ConfirmExit,
    /// Dismiss the exit confirmation.
    CancelExit,
    /// Acknowledge the front warning dialog.
    AcknowledgeWarning,
    /// A violation reported by an auxiliary detector.
    ReportViolation {
        /// Violation category.
        kind: ViolationKind,
        /// Optional audit detail.
        detail: Option<String>,
    },
}

/// Published view of a running session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Controller phase.
    pub phase: SessionPhase,
    /// Session state.
    pub state: SessionState,
    /// Candidate-facing projection.
    pub view: SessionView,
    /// Whether blocked keys are currently intercepted.
    pub fullscreen_armed: bool,
}

/// Result of [`ProctoringSession::run`].
#[derive(Debug)]
pub struct SessionSummary {
    /// Final session state.
    pub state: SessionState,
    /// Violations in arrival order.
    pub violations: Vec<Violation>,
    /// The fatal failure, when the session refused to start or ended on error.
    pub fatal_error: Option<SessionError>,
    /// Hand-off outcome of the session recording.
    pub recording: Option<UploadOutcome>,
    /// Final candidate-facing projection.
    pub view: SessionView,
}

/// Sender side used by the host shell and the candidate UI.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<CandidateCommand>,
    signals: mpsc::UnboundedSender<HostSignal>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    fn command(&self, command: CandidateCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::ChannelClosed)
    }

    fn signal(&self, signal: HostSignal) -> Result<(), SessionError> {
        self.signals
            .send(signal)
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Asks to end the interview.
    pub fn request_end(&self) -> Result<(), SessionError> {
        self.command(CandidateCommand::RequestEnd)
    }

    /// Confirms the exit confirmation.
    pub fn confirm_exit(&self) -> Result<(), SessionError> {
        self.command(CandidateCommand::ConfirmExit)
    }

    /// Dismisses the exit confirmation.
    pub fn cancel_exit(&self) -> Result<(), SessionError> {
        self.command(CandidateCommand::CancelExit)
    }

    /// Acknowledges the front warning dialog.
    pub fn acknowledge_warning(&self) -> Result<(), SessionError> {
        self.command(CandidateCommand::AcknowledgeWarning)
    }

    /// Reports a violation from an auxiliary detector.
    pub fn report_violation(
        &self,
        kind: ViolationKind,
        detail: Option<String>,
    ) -> Result<(), SessionError> {
        self.command(CandidateCommand::ReportViolation { kind, detail })
    }

    /// Forwards a key press. Returns `true` when the host must suppress the
    /// key's default action.
    pub fn key_pressed(&self, key: Key) -> Result<bool, SessionError> {
        let prevent_default = self.snapshots.borrow().fullscreen_armed && key.is_blocked();
        self.signal(HostSignal::Key(key))?;
        Ok(prevent_default)
    }

    /// Forwards a full-screen change.
    pub fn fullscreen_changed(&self, is_fullscreen: bool) -> Result<(), SessionError> {
        self.signal(HostSignal::FullscreenChanged(is_fullscreen))
    }

    /// Forwards a visibility loss.
    pub fn visibility_lost(&self) -> Result<(), SessionError> {
        self.signal(HostSignal::VisibilityLost)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

enum BackgroundResult {
    Upload(UploadOutcome),
    ViolationLogged {
        violation_id: String,
        result: Result<(), SessionError>,
    },
}

/// One proctored session.
///
/// Devices are held by the recorder; dropping the session without
/// [`ProctoringSession::teardown`] still releases them when the last recorder
/// handle goes away.
pub struct ProctoringSession {
    config: SessionConfig,
    machine: SessionMachine,
    sentinel: DisplaySentinel,
    classifier: Box<dyn PresenceClassifier>,
    recorder: Recorder,
    frames: RecorderFrames,
    enforcer: FullscreenEnforcer,
    timer: SessionTimer,
    capture: EvidenceCapture,
    uploader: EvidenceUploader,
    violation_log: Arc<dyn ViolationLogSink>,
    notifier: Arc<dyn SessionEndNotifier>,
    view: SessionView,
    background: JoinSet<BackgroundResult>,
    commands: mpsc::UnboundedReceiver<CandidateCommand>,
    signals: mpsc::UnboundedReceiver<HostSignal>,
    snapshots: watch::Sender<SessionSnapshot>,
    clock_origin: Instant,
    started_at_ms: u64,
    fatal_error: Option<SessionError>,
    recording: Option<UploadOutcome>,
    captures_taken: u64,
    torn_down: bool,
}

impl ProctoringSession {
    /// Wires a session and returns it with its handle.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] when `config` does not validate.
    pub fn new(
        config: SessionConfig,
        context: SessionContext,
        deps: SessionDeps,
    ) -> Result<(Self, SessionHandle), SessionError> {
        config.validate()?;

        let state = SessionState::new(
            &context.identity,
            context.session_id,
            context.started_at_ms,
            config.session_length_secs,
        );
        let machine = SessionMachine::new(state, config.escalation(), config.max_warnings);
        let recorder = Recorder::new(deps.devices);
        let frames = recorder.frames();
        let view = SessionView::new(context.app_version, config.session_length_secs);

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot {
            phase: machine.phase(),
            state: machine.state().clone(),
            view: view.clone(),
            fullscreen_armed: false,
        });

        let session = Self {
            timer: SessionTimer::with_tick(config.session_length_secs, config.clock_tick_ms),
            capture: EvidenceCapture::new(config.jpeg_quality),
            uploader: EvidenceUploader::new(
                deps.evidence_sink,
                config.retry_policy(),
                deps.local_store,
            ),
            config,
            machine,
            sentinel: DisplaySentinel::new(deps.display_probe),
            classifier: deps.classifier,
            recorder,
            frames,
            enforcer: FullscreenEnforcer::new(deps.fullscreen_host),
            violation_log: deps.violation_log,
            notifier: deps.notifier,
            view,
            background: JoinSet::new(),
            commands,
            signals,
            snapshots,
            clock_origin: Instant::now(),
            started_at_ms: context.started_at_ms,
            fatal_error: None,
            recording: None,
            captures_taken: 0,
            torn_down: false,
        };
        let handle = SessionHandle {
            commands: command_tx,
            signals: signal_tx,
            snapshots: snapshot_rx,
        };
        Ok((session, handle))
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Runs the session to completion and tears it down.
    ///
    /// Refuses to start unless `device_check` passed. Every failure inside the
    /// monitoring loop is turned into a log entry or a controlled transition.
    pub async fn run(&mut self, device_check: DeviceCheckResult) -> SessionSummary {
        if !device_check.all_passed() {
            warn!(
                session_id = %self.machine.state().session_id,
                ?device_check,
                "device check failed; refusing to start"
            );
            self.record_fatal(SessionError::DeviceCheckFailed(device_check));
            self.publish();
            return self.summary();
        }

        if self.start().await {
            self.monitor().await;
        }
        self.teardown().await;
        self.summary()
    }

    /// Stops the recorder, hands off the recording, releases full-screen,
    /// drains background evidence work and notifies the session-end
    /// collaborator. Idempotent.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            debug!("teardown already ran");
            return;
        }
        self.torn_down = true;
        self.machine.abandon();

        let session_id = self.machine.state().session_id.clone();
        let now_ms = self.now_ms();
        self.recording = self
            .recorder
            .stop_and_hand_off(&self.uploader, &session_id, now_ms)
            .await;
        if let Some(outcome) = self.recording.clone() {
            self.on_upload_outcome(outcome);
        }
        if self.view.recorder == StageStatus::Running {
            self.view.recorder = StageStatus::Healthy;
        }

        self.enforcer.release().await;

        while let Some(joined) = self.background.join_next().await {
            self.on_background_done(joined);
        }

        if let SessionPhase::Ended(termination_reason) = self.machine.phase() {
            let state = self.machine.state();
            let report = SessionEndReport {
                session_id,
                warning_count: state.warning_count,
                termination_reason,
                duration_seconds: state.elapsed_seconds,
            };
            self.notifier.session_ended(&report);
        }

        self.view.close_all();
        self.publish();
        info!("session torn down");
    }

    async fn start(&mut self) -> bool {
        if let Err(error) = self.machine.begin_start() {
            warn!(%error, "session start rejected");
            return false;
        }
        self.view.recorder = StageStatus::Running;
        self.publish();

        if let Err(error) = self.recorder.start().await {
            error!(%error, "recorder acquisition failed; ending session");
            self.machine.start_failed();
            self.view.recorder = StageStatus::Degraded;
            self.record_fatal(SessionError::DeviceAcquisition(error));
            return false;
        }

        match self.enforcer.engage().await {
            Ok(()) => self.view.fullscreen = StageStatus::Healthy,
            Err(error) => {
                let error = SessionError::from(error);
                warn!(%error, severity = ?error.severity(), "continuing without full-screen");
                self.view.fullscreen = StageStatus::Degraded;
                let now_ms = self.now_ms();
                self.view.push_notice(
                    "Full-screen mode is unavailable; please keep this window focused",
                    now_ms,
                );
            }
        }

        self.machine.start_succeeded();
        info!(
            session_id = %self.machine.state().session_id,
            session_length_secs = self.config.session_length_secs,
            "session active"
        );
        self.publish();
        true
    }

    async fn monitor(&mut self) {
        let origin = Instant::now();
        let clock_period = SessionConfig::period(self.config.clock_tick_ms);
        let chunk_period = SessionConfig::period(self.config.recorder_chunk_ms);

        let mut clock = interval_at(origin + clock_period, clock_period);
        let mut display = interval(SessionConfig::period(self.config.display_poll_ms));
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut presence = interval(SessionConfig::period(self.config.presence_sample_ms));
        presence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut chunks = interval_at(origin + chunk_period, chunk_period);
        chunks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.machine.is_ended() {
            tokio::select! {
                _ = clock.tick() => self.on_clock_tick(),
                _ = display.tick() => self.on_display_poll(),
                _ = presence.tick() => self.on_presence_tick(),
                _ = chunks.tick() => self.on_chunk_tick(),
                Some(signal) = self.signals.recv() => self.on_host_signal(signal),
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        info!("session view closed; ending session");
                        self.machine.abandon();
                    }
                },
                Some(joined) = self.background.join_next() => self.on_background_done(joined),
            }
            self.publish();
        }
    }

    fn on_clock_tick(&mut self) {
        match self.timer.tick(self.recorder.is_recording()) {
            TimerTick::Idle => {}
            TimerTick::Running { remaining_secs } => {
                self.machine
                    .sync_clock(self.timer.elapsed_secs(), remaining_secs);
                self.view.set_remaining(remaining_secs);
            }
            TimerTick::Expired => {
                self.machine.sync_clock(self.timer.elapsed_secs(), 0);
                self.view.set_remaining(0);
                if self.machine.timer_expired() {
                    info!("session time elapsed");
                }
            }
        }
    }

    fn on_display_poll(&mut self) {
        if !self.machine.accepts_violations() {
            return;
        }
        match self.sentinel.poll() {
            Ok(report) => {
                if let DisplayVerdict::ExtendedDisplay(method) = report.verdict {
                    let detail = format!(
                        "method={} geometry={} action=interview_terminated",
                        method.label(),
                        report.geometry.summary()
                    );
                    self.raise_violation(ViolationKind::ExtendedDisplay, Some(detail));
                }
            }
            Err(error) => warn!(%error, "display poll failed; skipping tick"),
        }
    }

    fn on_presence_tick(&mut self) {
        if !self.machine.accepts_violations() {
            return;
        }
        let Some(frame) = self.frames.latest_frame() else {
            debug!("no frame available for presence sampling");
            return;
        };
        let sample = self.classifier.classify(&frame);
        let now_ms = self.now_ms();
        if let Some(kind) = self.machine.assess_presence(sample.classification, now_ms) {
            self.raise_violation(kind, None);
        }
    }

    fn on_chunk_tick(&mut self) {
        if let Err(error) = self.recorder.collect_chunk() {
            error!(%error, "recorder failed while recording; ending session");
            self.machine.fail();
            self.view.recorder = StageStatus::Degraded;
            self.record_fatal(SessionError::Recorder(error));
        }
    }

    fn on_host_signal(&mut self, signal: HostSignal) {
        match signal {
            HostSignal::Key(key) => {
                if self.enforcer.on_key(key) == KeyDisposition::ExitAttempt {
                    self.pause(PauseCause::ExitAttempt);
                }
            }
            HostSignal::FullscreenChanged(is_fullscreen) => {
                let attempt = self.enforcer.on_fullscreen_change(is_fullscreen);
                if attempt.is_some() && self.machine.accepts_violations() {
                    self.raise_violation(ViolationKind::FullscreenExit, None);
                    self.pause(PauseCause::ExitAttempt);
                }
            }
            HostSignal::VisibilityLost => self.raise_violation(ViolationKind::TabSwitch, None),
        }
    }

    async fn on_command(&mut self, command: CandidateCommand) {
        match command {
            CandidateCommand::RequestEnd => self.pause(PauseCause::EndRequested),
            CandidateCommand::ConfirmExit => {
                if self.machine.confirm_exit() {
                    info!("candidate confirmed exit");
                }
            }
            CandidateCommand::CancelExit => {
                if !self.machine.cancel_pause() {
                    return;
                }
                self.view
                    .close_exit_confirmation(self.machine.state().remaining_seconds);
                match self.enforcer.resume().await {
                    Ok(()) => {
                        if self.view.fullscreen != StageStatus::Degraded {
                            self.view.fullscreen = StageStatus::Healthy;
                        }
                    }
                    Err(error) => {
                        warn!(%error, "full-screen could not be re-entered");
                        self.view.fullscreen = StageStatus::Degraded;
                    }
                }
            }
            CandidateCommand::AcknowledgeWarning => {
                self.view.acknowledge_warning();
            }
            CandidateCommand::ReportViolation { kind, detail } => {
                self.raise_violation(kind, detail)
            }
        }
    }

    fn pause(&mut self, cause: PauseCause) {
        if self.machine.request_pause(cause) {
            info!(?cause, "exit confirmation opened");
            self.view.open_exit_confirmation();
        }
    }

    /// Captures evidence, appends the violation and hands evidence and the
    /// log entry to background tasks.
    fn raise_violation(&mut self, kind: ViolationKind, detail: Option<String>) {
        if !self.machine.accepts_violations() {
            return;
        }
        let now_ms = self.now_ms();
        self.captures_taken += 1;
        let artifact = match self
            .capture
            .try_capture(&self.frames, kind, now_ms, self.captures_taken)
        {
            Ok(artifact) => Some(artifact),
            Err(error) => {
                let error = SessionError::from(error);
                warn!(
                    kind = kind.label(),
                    %error,
                    severity = ?error.severity(),
                    "continuing without evidence"
                );
                None
            }
        };
        let evidence_ref = artifact.as_ref().map(|artifact| artifact.evidence_ref.clone());

        let Some(recorded) = self.machine.record_violation(kind, now_ms, evidence_ref, detail)
        else {
            return;
        };
        let session_id = self.machine.state().session_id.clone();
        warn!(
            %session_id,
            violation_id = %recorded.violation.id,
            kind = kind.label(),
            warning_count = recorded.warning_number,
            has_evidence = recorded.violation.evidence_ref.is_some(),
            "violation recorded"
        );
        self.view
            .push_warning(recorded.violation.id.clone(), kind, recorded.warning_number);

        if let Some(artifact) = artifact {
            let uploader = self.uploader.clone();
            let upload = EvidenceUpload::from_capture(artifact, kind);
            if self.view.upload != StageStatus::Degraded {
                self.view.upload = StageStatus::Running;
            }
            self.background
                .spawn(async move { BackgroundResult::Upload(uploader.upload(upload).await) });
        }

        let sink = Arc::clone(&self.violation_log);
        let violation = recorded.violation;
        self.background.spawn(async move {
            let result = sink.persist(&session_id, &violation).await;
            BackgroundResult::ViolationLogged {
                violation_id: violation.id,
                result,
            }
        });
    }

    fn on_background_done(&mut self, joined: Result<BackgroundResult, JoinError>) {
        match joined {
            Ok(BackgroundResult::Upload(outcome)) => self.on_upload_outcome(outcome),
            Ok(BackgroundResult::ViolationLogged {
                violation_id,
                result,
            }) => match result {
                Ok(()) => debug!(%violation_id, "violation persisted"),
                Err(error) => {
                    warn!(
                        %violation_id,
                        %error,
                        severity = ?error.severity(),
                        "violation log sink failed"
                    )
                }
            },
            Err(error) => warn!(%error, "background evidence task failed"),
        }
    }

    fn on_upload_outcome(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Uploaded { .. } => {
                if self.view.upload != StageStatus::Degraded {
                    self.view.upload = StageStatus::Healthy;
                }
            }
            UploadOutcome::RetainedLocally {
                file_name, error, ..
            } => {
                let error = SessionError::from(error);
                warn!(
                    %file_name,
                    %error,
                    severity = ?error.severity(),
                    "evidence retained locally"
                );
                self.view.upload = StageStatus::Degraded;
                let now_ms = self.now_ms();
                self.view
                    .push_notice("Evidence upload failed; a copy is kept on this device", now_ms);
            }
        }
    }

    fn record_fatal(&mut self, error: SessionError) {
        self.view.show_fatal(error.user_message());
        if self.fatal_error.is_none() {
            self.fatal_error = Some(error);
        }
    }

    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.clock_origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.started_at_ms.saturating_add(elapsed)
    }

    fn publish(&self) {
        self.snapshots.send_replace(SessionSnapshot {
            phase: self.machine.phase(),
            state: self.machine.state().clone(),
            view: self.view.clone(),
            fullscreen_armed: self.enforcer.is_armed(),
        });
    }

    fn summary(&mut self) -> SessionSummary {
        SessionSummary {
            state: self.machine.state().clone(),
            violations: self.machine.log().entries().to_vec(),
            fatal_error: self.fatal_error.take(),
            recording: self.recording.clone(),
            view: self.view.clone(),
        }
    }
}
