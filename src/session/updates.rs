//! Outbound UI events published by the controller.

use serde::Serialize;

use super::state::{SessionSnapshot, SessionStatus};
use crate::channel::ConnectionState;
use crate::integrity::IntegrityFlag;
use crate::transcript::TranscriptEntry;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A short message for the candidate (a toast, in UI terms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// State changes the UI layer renders.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProctorEvent {
    StatusChanged { status: SessionStatus },
    ConnectionChanged { state: ConnectionState },
    TranscriptAppended { entry: TranscriptEntry },
    FlagRecorded { flag: IntegrityFlag },
    Notice(Notice),
    WaitingForAgent { waiting: bool },
    ClockTick { elapsed: u64, remaining: u64 },
    ListeningChanged { listening: bool },
    PendingResponse { text: String },
    InterimTranscript { text: String },
    SecureModeExits { count: u32, max: u32 },
    FaceDetected { detected: bool },
    MediaChanged { video: bool, audio: bool },
    NavigateToResults { session_id: String },
    Snapshot(Box<SessionSnapshot>),
}
