//! Countdown clock bounding the live session.

use std::time::Duration;

use crate::events::{EventSender, SessionEvent};
use crate::timer::{TimerHandle, cancel_slot};

/// Result of advancing the clock by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    Running { elapsed: u64, remaining: u64 },
    LimitReached { elapsed: u64 },
    /// The clock is stopped; the tick was late and is discarded.
    Stopped,
}

/// Per-second session clock.
///
/// The ticker posts [`SessionEvent::ClockTick`]; the controller calls
/// [`SessionClock::tick`] for each one. Ticks arriving after
/// [`SessionClock::stop`] are discarded.
#[derive(Debug)]
pub struct SessionClock {
    limit_secs: u64,
    elapsed_secs: u64,
    ticker: Option<TimerHandle>,
    running: bool,
}

impl SessionClock {
    pub fn new(limit_secs: u64) -> Self {
        Self {
            limit_secs,
            elapsed_secs: 0,
            ticker: None,
            running: false,
        }
    }

    /// Start ticking once per second. Restarting an already running clock is a no-op.
    pub fn start(&mut self, events: EventSender) {
        if self.running {
            return;
        }
        self.running = true;
        self.ticker = Some(TimerHandle::every(Duration::from_secs(1), events, || {
            SessionEvent::ClockTick
        }));
    }

    /// Stop ticking. Safe to call when never started.
    pub fn stop(&mut self) {
        self.running = false;
        cancel_slot(&mut self.ticker);
    }

    /// Account for one elapsed second.
    pub fn tick(&mut self) -> ClockTick {
        if !self.running {
            return ClockTick::Stopped;
        }
        self.elapsed_secs = (self.elapsed_secs + 1).min(self.limit_secs);
        if self.elapsed_secs >= self.limit_secs {
            ClockTick::LimitReached {
                elapsed: self.elapsed_secs,
            }
        } else {
            ClockTick::Running {
                elapsed: self.elapsed_secs,
                remaining: self.remaining_secs(),
            }
        }
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.limit_secs.saturating_sub(self.elapsed_secs)
    }

    #[must_use]
    pub fn limit_secs(&self) -> u64 {
        self.limit_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}
