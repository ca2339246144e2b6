//! Inbound events for the session event loop.
//!
//! Every platform callback, timer expiry, socket frame, and user action is
//! delivered to the [`SessionController`](crate::session::SessionController)
//! as one [`SessionEvent`] on a single FIFO queue. Handlers run one at a time,
//! in queue order, so no component state needs locking.

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::capabilities::SpeechInputEvent;
use crate::channel::ChannelEvent;
use crate::protocol::ServerMessage;

/// Sender half of the session event queue.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiver half of the session event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a new session event queue.
#[must_use]
pub fn event_queue() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Everything the session state machine reacts to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // -- user actions ------------------------------------------------------
    /// Begin the live session.
    StartRequested,
    /// Send the given text as the candidate's answer.
    Submit { text: String },
    /// Send whatever speech input has accumulated in the pending buffer.
    SubmitPending,
    /// Replace the pending buffer (typed edits).
    SetPending { text: String },
    /// Toggle sticky voice-input mode.
    ToggleListening,
    /// Toggle the camera track.
    ToggleVideo,
    /// Toggle the microphone track.
    ToggleAudio,
    /// End the session on the candidate's request.
    EndRequested { integrity_violation: bool },
    /// Publish a full state snapshot to subscribers.
    SnapshotRequested,
    /// Release everything and stop the loop.
    Dispose,

    // -- platform callbacks ------------------------------------------------
    /// The designated secure-mode exit key was pressed (and blocked).
    ExitKeyPressed { key: String },
    /// The platform reports secure mode became active or inactive.
    SecureModeChanged { active: bool },
    /// One analysed video frame.
    FaceFrame { face_count: usize },
    /// Speech recognition callback.
    Speech(SpeechInputEvent),

    // -- channel -----------------------------------------------------------
    /// Link / heartbeat / reconnect activity owned by the channel.
    Channel(ChannelEvent),
    /// A decoded agent message delivered by the channel's message handler.
    Server(ServerMessage),

    // -- integrity ---------------------------------------------------------
    /// The monitor's termination threshold was crossed.
    ViolationThresholdReached { reason: String },

    // -- timers ------------------------------------------------------------
    /// One second of live session time elapsed.
    ClockTick,
    /// The agent did not reply to response number `seq` in time.
    ResponseTimeout { seq: u64 },
    /// Re-request secure mode after a tolerated exit.
    ReenterSecureMode,
    /// Grace period after a terminate directive elapsed.
    ViolationGraceElapsed,
    /// Navigate to the results view now.
    NavigateDue,
}

/// User-facing commands accepted from outside the process (see the host bridge).
///
/// This is the serializable subset of [`SessionEvent`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UserCommand {
    Start,
    Submit { text: String },
    SubmitPending,
    SetPending { text: String },
    ToggleListening,
    ToggleVideo,
    ToggleAudio,
    End,
    Snapshot,
}

impl From<UserCommand> for SessionEvent {
    fn from(cmd: UserCommand) -> Self {
        match cmd {
            UserCommand::Start => Self::StartRequested,
            UserCommand::Submit { text } => Self::Submit { text },
            UserCommand::SubmitPending => Self::SubmitPending,
            UserCommand::SetPending { text } => Self::SetPending { text },
            UserCommand::ToggleListening => Self::ToggleListening,
            UserCommand::ToggleVideo => Self::ToggleVideo,
            UserCommand::ToggleAudio => Self::ToggleAudio,
            UserCommand::End => Self::EndRequested {
                integrity_violation: false,
            },
            UserCommand::Snapshot => Self::SnapshotRequested,
        }
    }
}
