//! Session record and the read-only snapshot exposed to the UI layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::channel::ConnectionState;
use crate::integrity::IntegrityFlag;
use crate::transcript::{TranscriptEntry, format_clock};

/// Lifecycle status. Moves only forward: Scheduled, Live, Ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Live,
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Live => write!(f, "live"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// One proctored interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub duration_limit_seconds: u64,
}

impl Session {
    pub fn new(id: impl Into<String>, duration_limit_seconds: u64) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Scheduled,
            started_at: None,
            elapsed_seconds: 0,
            duration_limit_seconds,
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Live
    }

    /// Scheduled to Live. Returns `false` from any other status.
    pub fn go_live(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != SessionStatus::Scheduled {
            return false;
        }
        self.status = SessionStatus::Live;
        self.started_at = Some(now);
        true
    }

    /// Live to Ended. Returns `false` from any other status.
    pub fn finish(&mut self) -> bool {
        if self.status != SessionStatus::Live {
            return false;
        }
        self.status = SessionStatus::Ended;
        true
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.duration_limit_seconds
            .saturating_sub(self.elapsed_seconds)
    }
}

/// Everything the UI renders, captured at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session: Session,
    pub connection: ConnectionState,
    pub remaining_seconds: u64,
    /// `remaining_seconds` as `MM:SS`.
    pub remaining_label: String,
    pub transcript: Vec<TranscriptEntry>,
    pub flags: Vec<IntegrityFlag>,
    pub violation_count: u64,
    pub secure_mode_exits: u32,
    pub max_secure_mode_exits: u32,
    pub waiting_for_agent: bool,
    pub listening: bool,
    pub pending_response: String,
    pub media_available: bool,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    /// `None` until the first analysed frame.
    pub face_detected: Option<bool>,
}

impl SessionSnapshot {
    pub(crate) fn remaining_label_for(session: &Session) -> String {
        format_clock(session.remaining_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        let mut s = Session::new("s1", 1500);
        assert!(!s.finish());
        assert_eq!(s.status, SessionStatus::Scheduled);

        assert!(s.go_live(Utc::now()));
        assert!(s.started_at.is_some());
        assert!(!s.go_live(Utc::now()));

        assert!(s.finish());
        assert!(!s.finish());
        assert!(!s.go_live(Utc::now()));
        assert_eq!(s.status, SessionStatus::Ended);
    }

    #[test]
    fn remaining_label() {
        let mut s = Session::new("s1", 1500);
        s.elapsed_seconds = 65;
        assert_eq!(s.remaining_seconds(), 1435);
        assert_eq!(SessionSnapshot::remaining_label_for(&s), "23:55");
    }
}
