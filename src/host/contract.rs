//! Versioned line protocol between the bridge and a native shell.
//!
//! Inbound lines are [`HostCommand`]s: user actions plus the platform
//! callbacks the shell observes (secure-mode changes, face counts, speech
//! results). Outbound lines are [`EventEnvelope`]s carrying either a UI event
//! from the controller or a [`ShellRequest`] the shell must carry out.

use serde::{Deserialize, Serialize};

use crate::capabilities::{RecognitionError, SpeechInputEvent};
use crate::events::{SessionEvent, UserCommand};
use crate::session::ProctorEvent;

/// Contract version stamped on every outbound line.
pub const EVENT_VERSION: u32 = 1;

/// Callbacks from the platform, as reported by the shell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlatformCommand {
    /// The exit key was pressed and blocked.
    ExitKey { key: String },
    SecureModeChanged { active: bool },
    FaceFrame { face_count: usize },
    SpeechStarted,
    SpeechResult { text: String, is_final: bool },
    SpeechError { code: String },
    SpeechEnded,
    /// Dispose the session and shut the bridge down.
    Stop,
}

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HostCommand {
    User(UserCommand),
    Platform(PlatformCommand),
}

impl HostCommand {
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Platform(PlatformCommand::Stop))
    }

    /// Secure-mode state carried by this command, if any.
    #[must_use]
    pub fn secure_mode_state(&self) -> Option<bool> {
        match self {
            Self::Platform(PlatformCommand::SecureModeChanged { active }) => Some(*active),
            _ => None,
        }
    }

    pub fn into_event(self) -> SessionEvent {
        match self {
            Self::User(cmd) => cmd.into(),
            Self::Platform(cmd) => match cmd {
                PlatformCommand::ExitKey { key } => SessionEvent::ExitKeyPressed { key },
                PlatformCommand::SecureModeChanged { active } => {
                    SessionEvent::SecureModeChanged { active }
                }
                PlatformCommand::FaceFrame { face_count } => SessionEvent::FaceFrame { face_count },
                PlatformCommand::SpeechStarted => SessionEvent::Speech(SpeechInputEvent::Started),
                PlatformCommand::SpeechResult { text, is_final } => {
                    SessionEvent::Speech(SpeechInputEvent::Result { text, is_final })
                }
                PlatformCommand::SpeechError { code } => SessionEvent::Speech(
                    SpeechInputEvent::Error(RecognitionError::from_code(&code)),
                ),
                PlatformCommand::SpeechEnded => SessionEvent::Speech(SpeechInputEvent::Ended),
                PlatformCommand::Stop => SessionEvent::Dispose,
            },
        }
    }
}

/// Something the shell must do on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ShellRequest {
    AcquireMedia,
    ReleaseMedia,
    SetVideo { enabled: bool },
    SetAudio { enabled: bool },
    StartRecognition { language: String, interim_results: bool },
    StopRecognition,
    Speak { text: String, rate: f32 },
    CancelSpeech,
    EnterSecureMode,
    ExitSecureMode,
}

/// Outbound payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum HostEvent {
    Ui(ProctorEvent),
    Shell(ShellRequest),
    /// An inbound line could not be parsed.
    ParseError { message: String },
}

/// One outbound line.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub v: u32,
    #[serde(flatten)]
    pub body: HostEvent,
}

impl EventEnvelope {
    pub fn new(body: HostEvent) -> Self {
        Self {
            v: EVENT_VERSION,
            body,
        }
    }
}
