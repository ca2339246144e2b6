//! Timers that post events into the session queue.
//!
//! A [`TimerHandle`] owns a background tokio task. Cancelling (or dropping)
//! the handle aborts the task. A timer that already fired may still have its
//! event sitting in the queue, so receivers that care about staleness tag the
//! event with a ticket and compare it on dispatch.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::{EventSender, SessionEvent};

/// Handle to a pending one-shot or periodic timer.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Post `event` once after `delay`.
    pub fn after(delay: Duration, events: EventSender, event: SessionEvent) -> Self {
        let deadline = Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = events.send(event);
        });
        Self { task }
    }

    /// Post `make()` every `period`, starting one full period from now.
    pub fn every<F>(period: Duration, events: EventSender, make: F) -> Self
    where
        F: Fn() -> SessionEvent + Send + 'static,
    {
        let first = Instant::now() + period;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(make()).is_err() {
                    // Queue gone; the session is over.
                    break;
                }
            }
        });
        Self { task }
    }

    /// Stop the timer. Safe to call more than once.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the timer task is still scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Cancel and clear an optional timer slot.
pub fn cancel_slot(slot: &mut Option<TimerHandle>) {
    if let Some(timer) = slot.take() {
        timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_queue;
    use crate::test_utils::settle;

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once_after_delay() {
        let (tx, mut rx) = event_queue();
        let _timer = TimerHandle::after(Duration::from_secs(3), tx, SessionEvent::NavigateDue);

        tokio::time::advance(Duration::from_millis(2_999)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::NavigateDue)));

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_one_shot_never_fires() {
        let (tx, mut rx) = event_queue();
        let mut slot = Some(TimerHandle::after(
            Duration::from_secs(1),
            tx,
            SessionEvent::NavigateDue,
        ));
        cancel_slot(&mut slot);
        cancel_slot(&mut slot);
        assert!(slot.is_none());

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_skips_immediate_tick() {
        let (tx, mut rx) = event_queue();
        let timer = TimerHandle::every(Duration::from_secs(1), tx, || SessionEvent::ClockTick);
        settle().await;
        assert!(rx.try_recv().is_err());

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        let mut ticks = 0;
        while rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 3);

        timer.cancel();
        settle().await;
        assert!(!timer.is_pending());
    }
}
