//! Integrity monitor: violation tracking, deduplication and escalation.
//!
//! The monitor only records and classifies observations. It never touches the
//! channel or the session; when the secure-mode exit threshold is crossed it
//! notifies whoever registered with
//! [`IntegrityMonitor::on_violation_threshold_reached`].
//!
//! Two independent counters exist:
//! - `secure_mode_exit_count` counts every exit attempt exactly once and
//!   drives escalation;
//! - `violation_count` counts every logical violation of any kind, even when
//!   the flag log suppressed the duplicate entry.
//!
//! Both only ever increase for the lifetime of a monitor (one per session).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::config::IntegrityConfig;

/// Category of an integrity observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    #[serde(rename = "fullscreen_exit_attempt")]
    SecureModeExitAttempt,
    CriticalViolation,
    NoFace,
    MultipleFaces,
}

impl FlagKind {
    /// Wire name used in `integrity_flag` messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SecureModeExitAttempt => "fullscreen_exit_attempt",
            Self::CriticalViolation => "critical_violation",
            Self::NoFace => "no_face",
            Self::MultipleFaces => "multiple_faces",
        }
    }
}

/// One timestamped integrity observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityFlag {
    pub kind: FlagKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// How the candidate tried to leave secure mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitMethod {
    /// The designated exit key (blocked before it took effect).
    Key(String),
    /// The platform's own affordance; secure mode was actually lost.
    Platform,
}

impl std::fmt::Display for ExitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, "the {key} key"),
            Self::Platform => write!(f, "the browser controls"),
        }
    }
}

/// Result of classifying one exit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitAttempt {
    /// Counted; the session continues with a warning.
    Warning { count: u32, remaining: u32 },
    /// Counted; the threshold is reached and the session must end.
    Terminate { count: u32 },
    /// Not counted (already terminating, or the same physical attempt as an
    /// exit key press that was counted just before).
    Ignored,
}

/// Outcome of one analysed video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceObservation {
    /// Exactly one face.
    Present,
    /// No face; `warned` is true when this frame produced a warning.
    Missing { warned: bool },
    /// More than one face; `flagged` is false when dedup suppressed the flag.
    Multiple { count: usize, flagged: bool },
}

/// Payload handed to threshold subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdBreach {
    pub reason: String,
    pub exit_count: u32,
}

type ThresholdHandler = Box<dyn FnMut(&ThresholdBreach) + Send>;

/// Tracks integrity violations for one session.
pub struct IntegrityMonitor {
    config: IntegrityConfig,
    flags: Vec<IntegrityFlag>,
    last_flag_at: HashMap<FlagKind, Instant>,
    violation_count: u64,
    secure_mode_exit_count: u32,
    last_face_warning_at: Option<Instant>,
    /// When a counted exit-key attempt still awaits its matching platform
    /// exit. Expires after the flag dedup window.
    key_exit_at: Option<Instant>,
    threshold_reached: bool,
    handlers: Vec<ThresholdHandler>,
}

impl IntegrityMonitor {
    pub fn new(config: IntegrityConfig) -> Self {
        Self {
            config,
            flags: Vec::new(),
            last_flag_at: HashMap::new(),
            violation_count: 0,
            secure_mode_exit_count: 0,
            last_face_warning_at: None,
            key_exit_at: None,
            threshold_reached: false,
            handlers: Vec::new(),
        }
    }

    /// Subscribe to the termination threshold. Handlers fire once, on the
    /// attempt that crosses it.
    pub fn on_violation_threshold_reached<F>(&mut self, handler: F)
    where
        F: FnMut(&ThresholdBreach) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    #[must_use]
    pub fn flags(&self) -> &[IntegrityFlag] {
        &self.flags
    }

    #[must_use]
    pub fn violation_count(&self) -> u64 {
        self.violation_count
    }

    #[must_use]
    pub fn secure_mode_exit_count(&self) -> u32 {
        self.secure_mode_exit_count
    }

    #[must_use]
    pub fn max_secure_mode_exits(&self) -> u32 {
        self.config.max_secure_mode_exits
    }

    #[must_use]
    pub fn threshold_reached(&self) -> bool {
        self.threshold_reached
    }

    /// Append a flag unless one of the same kind was recorded within the
    /// dedup window. Returns whether the flag was recorded.
    pub fn record_flag(&mut self, kind: FlagKind, description: impl Into<String>, now: Instant) -> bool {
        if let Some(last) = self.last_flag_at.get(&kind)
            && now.saturating_duration_since(*last) < self.config.flag_dedup_window()
        {
            tracing::debug!(kind = kind.as_str(), "suppressing duplicate integrity flag");
            return false;
        }
        let flag = IntegrityFlag {
            kind,
            description: description.into(),
            timestamp: Utc::now(),
        };
        tracing::info!(kind = kind.as_str(), description = %flag.description, "integrity flag recorded");
        self.flags.push(flag);
        self.last_flag_at.insert(kind, now);
        true
    }

    /// Count one attempt to leave secure mode and classify it.
    pub fn record_exit_attempt(&mut self, method: &ExitMethod, now: Instant) -> ExitAttempt {
        if self.threshold_reached {
            return ExitAttempt::Ignored;
        }
        match method {
            ExitMethod::Key(_) => self.key_exit_at = Some(now),
            ExitMethod::Platform => {
                if let Some(at) = self.key_exit_at.take()
                    && now.saturating_duration_since(at) < self.config.flag_dedup_window()
                {
                    tracing::debug!("platform exit follows a counted exit key; not counting twice");
                    return ExitAttempt::Ignored;
                }
            }
        }

        self.secure_mode_exit_count += 1;
        self.violation_count += 1;
        let count = self.secure_mode_exit_count;
        let max = self.config.max_secure_mode_exits;
        tracing::warn!(count, max, "secure mode exit attempt via {method}");

        self.record_flag(
            FlagKind::SecureModeExitAttempt,
            format!("User attempted to exit fullscreen using {method} ({count}/{max})"),
            now,
        );

        if count < max {
            return ExitAttempt::Warning {
                count,
                remaining: max - count,
            };
        }

        self.threshold_reached = true;
        let reason = "Exceeded fullscreen exit attempts".to_owned();
        self.record_flag(FlagKind::CriticalViolation, reason.clone(), now);
        let breach = ThresholdBreach {
            reason,
            exit_count: count,
        };
        for handler in &mut self.handlers {
            handler(&breach);
        }
        ExitAttempt::Terminate { count }
    }

    /// The platform confirmed secure mode is active again; a later platform
    /// exit is a new attempt.
    pub fn secure_mode_restored(&mut self) {
        self.key_exit_at = None;
    }

    /// Apply the face-presence policy to one analysed frame.
    pub fn observe_faces(&mut self, face_count: usize, now: Instant) -> FaceObservation {
        match face_count {
            1 => FaceObservation::Present,
            0 => {
                let due = self.last_face_warning_at.is_none_or(|last| {
                    now.saturating_duration_since(last) >= self.config.face_warning_interval()
                });
                if !due {
                    return FaceObservation::Missing { warned: false };
                }
                self.last_face_warning_at = Some(now);
                self.violation_count += 1;
                self.record_flag(FlagKind::NoFace, "Candidate face not visible", now);
                FaceObservation::Missing { warned: true }
            }
            count => {
                self.violation_count += 1;
                let flagged =
                    self.record_flag(FlagKind::MultipleFaces, "Multiple faces detected in frame", now);
                FaceObservation::Multiple { count, flagged }
            }
        }
    }
}
