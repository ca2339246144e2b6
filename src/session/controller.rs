//! The session state machine.
//!
//! [`SessionController`] owns every component of a live interview and is the
//! only consumer of the session event queue. All state transitions happen in
//! [`SessionController::dispatch`], one event at a time, so nothing here is
//! shared or locked. Components that need to call back (the channel's message
//! handler, the integrity monitor's threshold subscribers, timers, the face
//! sampler, speech recognition) post a [`SessionEvent`] instead.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::state::{Session, SessionSnapshot, SessionStatus};
use super::updates::{Notice, ProctorEvent};
use crate::backend::SessionBackend;
use crate::capabilities::{Capabilities, FrameSampler, SpeechInputEvent};
use crate::channel::{
    ChannelEvent, ChannelUpdate, ConnectionState, Connector, SessionChannel, channel_url,
};
use crate::clock::{ClockTick, SessionClock};
use crate::config::ProctorConfig;
use crate::error::{ProctorError, Result};
use crate::events::{EventReceiver, EventSender, SessionEvent, event_queue};
use crate::integrity::{ExitAttempt, ExitMethod, FaceObservation, IntegrityMonitor};
use crate::protocol::{ClientMessage, NORMAL_CLOSURE, ServerMessage, ViolationAction};
use crate::timer::{TimerHandle, cancel_slot};
use crate::transcript::{Speaker, Transcript};

/// Capacity of the UI event broadcast.
const UPDATE_CAPACITY: usize = 256;

/// How a session finished, returned by [`SessionController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: String,
    pub status: SessionStatus,
    pub integrity_violation: bool,
    pub navigated: bool,
}

/// Top-level controller for one proctored session.
pub struct SessionController {
    config: ProctorConfig,
    session: Session,
    caps: Capabilities,
    backend: Arc<dyn SessionBackend>,
    channel: SessionChannel,
    monitor: IntegrityMonitor,
    transcript: Transcript,
    clock: SessionClock,
    events_tx: EventSender,
    events_rx: EventReceiver,
    updates: broadcast::Sender<ProctorEvent>,
    sampler: Option<FrameSampler>,
    response_timer: Option<TimerHandle>,
    response_seq: u64,
    reenter_timer: Option<TimerHandle>,
    grace_timer: Option<TimerHandle>,
    navigate_timer: Option<TimerHandle>,
    waiting_for_agent: bool,
    listening: bool,
    pending: String,
    media_available: bool,
    speech_available: bool,
    video_enabled: bool,
    audio_enabled: bool,
    face_detected: Option<bool>,
    flags_published: usize,
    ending: bool,
    integrity_violation: bool,
    navigated: bool,
    disposed: bool,
}

impl SessionController {
    pub fn new(
        config: ProctorConfig,
        session_id: impl Into<String>,
        caps: Capabilities,
        backend: Arc<dyn SessionBackend>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (events_tx, events_rx) = event_queue();
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

        let mut channel = SessionChannel::new(
            config.channel.clone(),
            config.backend.clone(),
            connector,
            events_tx.clone(),
        );
        let tx = events_tx.clone();
        channel.on_message(move |msg| {
            let _ = tx.send(SessionEvent::Server(msg));
        });

        let mut monitor = IntegrityMonitor::new(config.integrity.clone());
        let tx = events_tx.clone();
        monitor.on_violation_threshold_reached(move |breach| {
            let _ = tx.send(SessionEvent::ViolationThresholdReached {
                reason: breach.reason.clone(),
            });
        });

        let session = Session::new(session_id, config.session.duration_limit_secs);
        let clock = SessionClock::new(config.session.duration_limit_secs);

        Self {
            config,
            session,
            caps,
            backend,
            channel,
            monitor,
            transcript: Transcript::new(),
            clock,
            events_tx,
            events_rx,
            updates,
            sampler: None,
            response_timer: None,
            response_seq: 0,
            reenter_timer: None,
            grace_timer: None,
            navigate_timer: None,
            waiting_for_agent: false,
            listening: false,
            pending: String::new(),
            media_available: false,
            speech_available: false,
            video_enabled: true,
            audio_enabled: true,
            face_detected: None,
            flags_published: 0,
            ending: false,
            integrity_violation: false,
            navigated: false,
            disposed: false,
        }
    }

    /// Sender for posting events into this controller's queue.
    #[must_use]
    pub fn handle(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Subscribe to UI events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProctorEvent> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }

    #[must_use]
    pub fn is_waiting_for_agent(&self) -> bool {
        self.waiting_for_agent
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    #[must_use]
    pub fn pending_response(&self) -> &str {
        &self.pending
    }

    /// Full user-facing state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            connection: self.channel.state(),
            remaining_seconds: self.session.remaining_seconds(),
            remaining_label: SessionSnapshot::remaining_label_for(&self.session),
            transcript: self.transcript.entries().to_vec(),
            flags: self.monitor.flags().to_vec(),
            violation_count: self.monitor.violation_count(),
            secure_mode_exits: self.monitor.secure_mode_exit_count(),
            max_secure_mode_exits: self.monitor.max_secure_mode_exits(),
            waiting_for_agent: self.waiting_for_agent,
            listening: self.listening,
            pending_response: self.pending.clone(),
            media_available: self.media_available,
            video_enabled: self.video_enabled,
            audio_enabled: self.audio_enabled,
            face_detected: self.face_detected,
        }
    }

    /// Bring the session live.
    ///
    /// Media and speech failures degrade the session with a notice. A failed
    /// start-session call leaves the session `Scheduled`.
    ///
    /// # Errors
    ///
    /// Returns [`ProctorError::Session`] if the session was already started,
    /// [`ProctorError::Config`] for an unusable channel URL, and
    /// [`ProctorError::Backend`] when the start-session call fails.
    pub async fn start(&mut self) -> Result<()> {
        if self.session.status != SessionStatus::Scheduled || self.disposed {
            return Err(ProctorError::Session(format!(
                "cannot start a session that is {}",
                self.session.status
            )));
        }
        channel_url(&self.config.backend, &self.session.id)?;
        let session_id = self.session.id.clone();
        tracing::info!(session_id = %session_id, "starting proctored session");

        self.acquire_media().await;
        self.init_speech();

        if let Err(e) = self.backend.start_session(&session_id).await {
            tracing::error!(session_id = %session_id, "start-session call failed: {e}");
            self.notify(Notice::error("Failed to start interview"));
            return Err(e);
        }

        self.session.go_live(Utc::now());
        self.emit(ProctorEvent::StatusChanged {
            status: SessionStatus::Live,
        });

        if let Err(e) = self.channel.open(&session_id) {
            tracing::error!(session_id = %session_id, "failed to open session channel: {e}");
        }
        self.emit_connection();

        if let Err(e) = self.caps.secure_mode.enter() {
            tracing::warn!("secure mode request failed: {e}");
        }
        self.clock.start(self.events_tx.clone());

        self.notify(Notice::success("Interview started"));
        self.notify(Notice::info("Entering secure fullscreen mode..."));
        Ok(())
    }

    async fn acquire_media(&mut self) {
        match self.caps.media.acquire().await {
            Ok(()) => {
                self.media_available = true;
                self.notify(Notice::success("Camera and microphone initialized"));
            }
            Err(e) => {
                tracing::warn!("media acquisition failed; continuing without camera: {e}");
                self.media_available = false;
                self.notify(Notice::error("Failed to access camera/microphone"));
                return;
            }
        }

        let Some(mut detector) = self.caps.face_detector.take() else {
            return;
        };
        let Some(source) = self.caps.media.frame_source() else {
            tracing::debug!("no in-process frame source; expecting face counts from the platform");
            return;
        };
        match detector.initialize(&self.config.face).await {
            Ok(()) => {
                self.sampler = Some(FrameSampler::spawn(
                    source,
                    detector,
                    self.config.face.sample_interval(),
                    self.events_tx.clone(),
                ));
            }
            Err(e) => {
                tracing::warn!("face detector failed to initialize: {e}");
                self.notify(Notice::error("Face detection initialization failed"));
            }
        }
    }

    fn init_speech(&mut self) {
        match self
            .caps
            .speech_input
            .initialize(&self.config.speech, self.events_tx.clone())
        {
            Ok(()) => self.speech_available = true,
            Err(e) => {
                tracing::warn!("speech recognition unavailable: {e}");
                self.speech_available = false;
            }
        }
    }

    /// Send a candidate answer.
    ///
    /// Blank text and calls outside a live session are ignored. When the
    /// channel is down the answer is not sent and a reconnect is forced.
    pub fn submit_response(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.session.is_live() || self.ending {
            tracing::debug!("ignoring response outside a live session");
            return;
        }
        match self.channel.state() {
            ConnectionState::Disconnected => {
                self.notify(Notice::error("Not connected. Reconnecting..."));
                self.channel.reconnect_now();
                self.emit_connection();
                return;
            }
            ConnectionState::Connecting => {
                self.notify(Notice::error("Connection not ready. Please wait..."));
                return;
            }
            ConnectionState::Connected => {}
        }

        let entry = self
            .transcript
            .push(Speaker::Candidate, text, self.clock.elapsed_secs());
        self.emit(ProctorEvent::TranscriptAppended { entry });
        self.set_waiting(true);

        let msg = ClientMessage::CandidateResponse {
            content: text.to_owned(),
        };
        if !self.channel.send(&msg) {
            tracing::warn!("candidate response could not be queued on the channel");
        }

        self.pending.clear();
        self.emit(ProctorEvent::PendingResponse {
            text: String::new(),
        });

        self.response_seq += 1;
        self.response_timer = Some(TimerHandle::after(
            self.config.session.response_timeout(),
            self.events_tx.clone(),
            SessionEvent::ResponseTimeout {
                seq: self.response_seq,
            },
        ));
        self.notify(Notice::success("Response sent"));
    }

    /// Send the accumulated speech buffer as the answer.
    pub fn submit_pending(&mut self) {
        let text = self.pending.clone();
        self.submit_response(&text);
    }

    /// Finish the session. Only the first call while live has any effect.
    pub async fn end(&mut self, integrity_violation: bool) {
        if !self.session.is_live() || self.ending {
            tracing::debug!(status = %self.session.status, "end ignored");
            return;
        }
        self.ending = true;
        // Any end after the exit threshold is a violation end, whoever asked.
        let integrity_violation = integrity_violation || self.monitor.threshold_reached();
        self.integrity_violation = integrity_violation;
        let session_id = self.session.id.clone();
        tracing::info!(session_id = %session_id, integrity_violation, "ending session");

        self.stop_listening();
        cancel_slot(&mut self.response_timer);
        cancel_slot(&mut self.reenter_timer);
        cancel_slot(&mut self.grace_timer);
        self.set_waiting(false);

        if self.channel.state() == ConnectionState::Connected {
            self.channel.send(&ClientMessage::EndInterview {
                integrity_violation,
                fullscreen_exits: self.monitor.secure_mode_exit_count(),
            });
            tokio::time::sleep(self.config.session.end_ack_grace()).await;
        }

        let end_failed = match self.backend.end_session(&session_id).await {
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(session_id = %session_id, "end-session call failed: {e}");
                self.notify(Notice::error(format!("Error ending interview: {e}")));
                true
            }
        };

        self.clock.stop();
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
        }
        if let Err(e) = self.caps.secure_mode.exit() {
            tracing::warn!("failed to leave secure mode: {e}");
        }
        self.channel.close(NORMAL_CLOSURE);
        self.emit_connection();

        self.session.finish();
        self.emit(ProctorEvent::StatusChanged {
            status: SessionStatus::Ended,
        });
        if !end_failed {
            if integrity_violation {
                self.notify(Notice::error("Interview ended due to integrity violation"));
            } else {
                self.notify(Notice::success("Interview completed successfully"));
            }
        }

        let delay = if end_failed {
            self.config.session.failed_end_navigation_delay()
        } else {
            self.config.session.results_navigation_delay()
        };
        self.navigate_timer = Some(TimerHandle::after(
            delay,
            self.events_tx.clone(),
            SessionEvent::NavigateDue,
        ));
    }

    /// Release every live resource. Safe to call repeatedly and before `start`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        tracing::debug!(session_id = %self.session.id, "disposing session resources");

        self.clock.stop();
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
        }
        cancel_slot(&mut self.response_timer);
        cancel_slot(&mut self.reenter_timer);
        cancel_slot(&mut self.grace_timer);
        cancel_slot(&mut self.navigate_timer);
        self.channel.close(NORMAL_CLOSURE);
        self.listening = false;
        self.caps.speech_input.stop();
        self.caps.speech_output.cancel();
        self.caps.media.release();
        if let Err(e) = self.caps.secure_mode.exit() {
            tracing::debug!("secure mode exit during dispose failed: {e}");
        }
    }

    /// Flip sticky voice-input mode.
    pub fn toggle_listening(&mut self) {
        if !self.speech_available {
            self.notify(Notice::error(
                "Speech recognition not available in your browser",
            ));
            return;
        }
        if self.listening {
            self.stop_listening();
            self.notify(Notice::info("Voice input stopped"));
            return;
        }
        if !self.session.is_live() || self.ending {
            tracing::debug!(status = %self.session.status, "voice input only available while live");
            self.notify(Notice::info("Voice input is available once the interview is live"));
            return;
        }
        match self.caps.speech_input.start() {
            Ok(()) => {
                self.set_listening(true);
                self.notify(Notice::success("Listening..."));
            }
            Err(e) => {
                tracing::warn!("failed to start speech recognition: {e}");
                self.notify(Notice::error("Failed to start voice input"));
            }
        }
    }

    pub fn toggle_video(&mut self) {
        if !self.media_available {
            self.notify(Notice::warning("Camera is not available"));
            return;
        }
        self.video_enabled = !self.video_enabled;
        self.caps.media.set_video_enabled(self.video_enabled);
        self.emit_media();
    }

    pub fn toggle_audio(&mut self) {
        if !self.media_available {
            self.notify(Notice::warning("Microphone is not available"));
            return;
        }
        self.audio_enabled = !self.audio_enabled;
        self.caps.media.set_audio_enabled(self.audio_enabled);
        self.emit_media();
    }

    /// Process every event already queued, without waiting for new ones.
    pub async fn drain_pending(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event).await;
        }
    }

    /// Drive the session until it navigates to results or is disposed.
    pub async fn run(&mut self) -> SessionOutcome {
        while !self.disposed && !self.navigated {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.dispatch(event).await;
        }
        self.dispose();
        SessionOutcome {
            session_id: self.session.id.clone(),
            status: self.session.status,
            integrity_violation: self.integrity_violation,
            navigated: self.navigated,
        }
    }

    /// Apply one event.
    pub async fn dispatch(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StartRequested => {
                if let Err(e) = self.start().await {
                    tracing::warn!("start failed: {e}");
                }
            }
            SessionEvent::Submit { text } => self.submit_response(&text),
            SessionEvent::SubmitPending => self.submit_pending(),
            SessionEvent::SetPending { text } => {
                self.pending = text;
                self.emit(ProctorEvent::PendingResponse {
                    text: self.pending.clone(),
                });
            }
            SessionEvent::ToggleListening => self.toggle_listening(),
            SessionEvent::ToggleVideo => self.toggle_video(),
            SessionEvent::ToggleAudio => self.toggle_audio(),
            SessionEvent::EndRequested {
                integrity_violation,
            } => self.end(integrity_violation).await,
            SessionEvent::SnapshotRequested => {
                self.emit(ProctorEvent::Snapshot(Box::new(self.snapshot())));
            }
            SessionEvent::Dispose => self.dispose(),

            SessionEvent::ExitKeyPressed { key } => {
                self.on_exit_attempt(ExitMethod::Key(key));
            }
            SessionEvent::SecureModeChanged { active } => {
                if active {
                    self.monitor.secure_mode_restored();
                } else {
                    self.on_exit_attempt(ExitMethod::Platform);
                }
            }
            SessionEvent::FaceFrame { face_count } => self.on_face_frame(face_count),
            SessionEvent::Speech(ev) => self.on_speech(ev),

            SessionEvent::Channel(ev) => self.on_channel_event(ev),
            SessionEvent::Server(msg) => self.on_server_message(msg).await,

            SessionEvent::ViolationThresholdReached { reason } => self.on_threshold(reason),

            SessionEvent::ClockTick => self.on_clock_tick().await,
            SessionEvent::ResponseTimeout { seq } => {
                if seq != self.response_seq || !self.waiting_for_agent {
                    return;
                }
                self.response_timer = None;
                tracing::warn!(seq, "agent response timed out");
                self.set_waiting(false);
                self.notify(Notice::error("AI response timeout. Please try again."));
            }
            SessionEvent::ReenterSecureMode => {
                self.reenter_timer = None;
                if !self.session.is_live() || self.ending || self.monitor.threshold_reached() {
                    return;
                }
                if !self.caps.secure_mode.is_active()
                    && let Err(e) = self.caps.secure_mode.enter()
                {
                    tracing::warn!("failed to re-enter secure mode: {e}");
                }
            }
            SessionEvent::ViolationGraceElapsed => {
                self.grace_timer = None;
                self.end(true).await;
            }
            SessionEvent::NavigateDue => {
                self.navigate_timer = None;
                if !self.navigated {
                    self.navigated = true;
                    tracing::info!(session_id = %self.session.id, "navigating to results");
                    self.emit(ProctorEvent::NavigateToResults {
                        session_id: self.session.id.clone(),
                    });
                }
            }
        }
    }

    fn on_exit_attempt(&mut self, method: ExitMethod) {
        if !self.session.is_live() || self.ending {
            return;
        }
        let attempt = self.monitor.record_exit_attempt(&method, Instant::now());
        self.publish_new_flags();
        match attempt {
            ExitAttempt::Warning { count, remaining } => {
                self.emit_exit_count();
                let chances = if remaining == 1 { "chance" } else { "chances" };
                self.notify(Notice::error(format!(
                    "WARNING #{count}: Attempting to exit fullscreen via {method} is a security violation. {remaining} {chances} remaining."
                )));
                cancel_slot(&mut self.reenter_timer);
                self.schedule_reentry();
            }
            ExitAttempt::Terminate { count } => {
                self.emit_exit_count();
                self.notify(Notice::error(format!(
                    "Interview terminated: Exceeded fullscreen exit attempts ({count}/{})",
                    self.monitor.max_secure_mode_exits()
                )));
            }
            // A late platform report of an already counted key exit still
            // needs secure mode back.
            ExitAttempt::Ignored => {
                if matches!(method, ExitMethod::Platform)
                    && !self.monitor.threshold_reached()
                    && self.reenter_timer.is_none()
                {
                    self.schedule_reentry();
                }
            }
        }
    }

    fn schedule_reentry(&mut self) {
        self.reenter_timer = Some(TimerHandle::after(
            self.config.integrity.secure_mode_reenter_delay(),
            self.events_tx.clone(),
            SessionEvent::ReenterSecureMode,
        ));
    }

    fn on_threshold(&mut self, reason: String) {
        if !self.session.is_live() || self.ending || self.grace_timer.is_some() {
            return;
        }
        tracing::warn!(session_id = %self.session.id, %reason, "integrity threshold reached; terminating");
        self.channel.send(&ClientMessage::IntegrityViolation {
            reason,
            action: ViolationAction::Terminate,
        });
        cancel_slot(&mut self.reenter_timer);
        if let Err(e) = self.caps.secure_mode.exit() {
            tracing::warn!("failed to force secure mode exit: {e}");
        }
        self.grace_timer = Some(TimerHandle::after(
            self.config.integrity.termination_grace(),
            self.events_tx.clone(),
            SessionEvent::ViolationGraceElapsed,
        ));
    }

    fn on_face_frame(&mut self, face_count: usize) {
        let detected = face_count > 0;
        if self.face_detected != Some(detected) {
            self.face_detected = Some(detected);
            self.emit(ProctorEvent::FaceDetected { detected });
        }
        if !self.session.is_live() || self.ending {
            return;
        }
        let observation = self.monitor.observe_faces(face_count, Instant::now());
        self.publish_new_flags();
        match observation {
            FaceObservation::Missing { warned: true } => self.notify(Notice::error(
                "Your face is not visible! Please ensure you are in front of the camera.",
            )),
            FaceObservation::Multiple { flagged: true, .. } => self.notify(Notice::error(
                "Multiple faces detected! Only candidate should be visible.",
            )),
            _ => {}
        }
    }

    fn on_speech(&mut self, event: SpeechInputEvent) {
        match event {
            SpeechInputEvent::Started => tracing::debug!("speech recognition started"),
            SpeechInputEvent::Result { text, is_final } => {
                if is_final {
                    self.pending.push_str(&text);
                    self.pending.push(' ');
                    self.emit(ProctorEvent::PendingResponse {
                        text: self.pending.clone(),
                    });
                } else if self.config.speech.interim_results {
                    self.emit(ProctorEvent::InterimTranscript { text });
                }
            }
            SpeechInputEvent::Error(err) => {
                tracing::warn!(?err, "speech recognition error");
                self.set_listening(false);
                self.notify(Notice::error(err.user_message()));
            }
            SpeechInputEvent::Ended => {
                if !self.listening {
                    return;
                }
                if let Err(e) = self.caps.speech_input.start() {
                    tracing::warn!("failed to restart speech recognition: {e}");
                    self.set_listening(false);
                    self.notify(Notice::error("Failed to start voice input"));
                }
            }
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        let live = self.session.is_live() && !self.ending;
        let Some(update) = self.channel.handle_event(event, live) else {
            return;
        };
        self.emit_connection();
        match update {
            ChannelUpdate::Connected => {
                self.notify(Notice::success("Connected to AI interviewer"));
            }
            ChannelUpdate::Lost {
                reconnect_scheduled: true,
                ..
            } => self.notify(Notice::warning("Connection lost - reconnecting...")),
            ChannelUpdate::Lost { .. } | ChannelUpdate::Reconnecting => {}
        }
    }

    async fn on_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::AiMessage { content } => {
                if !self.session.is_live() {
                    tracing::debug!("dropping agent message outside a live session");
                    return;
                }
                cancel_slot(&mut self.response_timer);
                self.set_waiting(false);
                let entry =
                    self.transcript
                        .push(Speaker::Agent, content.clone(), self.clock.elapsed_secs());
                self.emit(ProctorEvent::TranscriptAppended { entry });
                self.caps.speech_output.cancel();
                if let Err(e) = self
                    .caps
                    .speech_output
                    .speak(&content, self.config.speech.speech_rate)
                {
                    tracing::warn!("speech synthesis failed: {e}");
                }
            }
            ServerMessage::Error { message } => {
                cancel_slot(&mut self.response_timer);
                self.set_waiting(false);
                let message = message.unwrap_or_else(|| "Failed to process response".to_owned());
                tracing::warn!(%message, "agent reported an error");
                self.notify(Notice::error(format!("AI Error: {message}")));
            }
            ServerMessage::Evaluation { .. } => {
                if self.session.is_live() && !self.ending {
                    tracing::info!("evaluation ready; ending session");
                    let violation = self.monitor.threshold_reached();
                    self.end(violation).await;
                }
            }
            ServerMessage::Pong {} | ServerMessage::Unknown => {}
        }
    }

    async fn on_clock_tick(&mut self) {
        match self.clock.tick() {
            ClockTick::Running { elapsed, remaining } => {
                self.session.elapsed_seconds = elapsed;
                self.emit(ProctorEvent::ClockTick { elapsed, remaining });
            }
            ClockTick::LimitReached { elapsed } => {
                self.session.elapsed_seconds = elapsed;
                self.emit(ProctorEvent::ClockTick {
                    elapsed,
                    remaining: 0,
                });
                tracing::info!(elapsed, "session time limit reached");
                self.end(false).await;
            }
            ClockTick::Stopped => {}
        }
    }

    /// Forward flags the monitor recorded since the last call.
    fn publish_new_flags(&mut self) {
        let fresh = self
            .monitor
            .flags()
            .get(self.flags_published..)
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        self.flags_published = self.monitor.flags().len();
        for flag in fresh {
            self.channel.send(&ClientMessage::IntegrityFlag {
                flag_type: flag.kind.as_str().to_owned(),
                description: flag.description.clone(),
            });
            self.emit(ProctorEvent::FlagRecorded { flag });
        }
    }

    fn stop_listening(&mut self) {
        if self.listening {
            self.caps.speech_input.stop();
            self.set_listening(false);
        }
    }

    fn set_listening(&mut self, listening: bool) {
        if self.listening != listening {
            self.listening = listening;
            self.emit(ProctorEvent::ListeningChanged { listening });
        }
    }

    fn set_waiting(&mut self, waiting: bool) {
        if self.waiting_for_agent != waiting {
            self.waiting_for_agent = waiting;
            self.emit(ProctorEvent::WaitingForAgent { waiting });
        }
    }

    fn emit_connection(&self) {
        self.emit(ProctorEvent::ConnectionChanged {
            state: self.channel.state(),
        });
    }

    fn emit_exit_count(&self) {
        self.emit(ProctorEvent::SecureModeExits {
            count: self.monitor.secure_mode_exit_count(),
            max: self.monitor.max_secure_mode_exits(),
        });
    }

    fn emit_media(&self) {
        self.emit(ProctorEvent::MediaChanged {
            video: self.video_enabled,
            audio: self.audio_enabled,
        });
    }

    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, text = %notice.text, "notice");
        self.emit(ProctorEvent::Notice(notice));
    }

    fn emit(&self, event: ProctorEvent) {
        // No subscribers is fine.
        let _ = self.updates.send(event);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.dispose();
    }
}
