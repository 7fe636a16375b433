//! Cancellable periodic timer with a single armed handle.
//!
//! The ticker owns no task; the caller waits until [`Ticker::remaining`]
//! elapses on its context clock and then calls [`Ticker::fire`]. Re-arming
//! replaces the previous handle, so a stale tick can never fire.

use std::time::Duration;

/// Identifies one arming of a [`Ticker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy)]
struct Armed {
    id: TimerId,
    interval: Duration,
    deadline: Duration,
}

/// Periodic timer driven by an external clock.
#[derive(Debug, Default)]
pub struct Ticker {
    armed: Option<Armed>,
    next_id: u64,
}

impl Ticker {
    /// Creates a disarmed ticker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the ticker; the first tick is due one `interval` after `now`.
    ///
    /// Any previous arming is discarded.
    pub fn arm(&mut self, now: Duration, interval: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.armed = Some(Armed {
            id,
            interval,
            deadline: now + interval,
        });
        id
    }

    /// Cancels the current arming.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Handle of the current arming.
    pub fn current(&self) -> Option<TimerId> {
        self.armed.map(|a| a.id)
    }

    /// When the next tick is due.
    pub fn deadline(&self) -> Option<Duration> {
        self.armed.map(|a| a.deadline)
    }

    /// Time left until the next tick (zero when overdue).
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.deadline().map(|d| d.saturating_sub(now))
    }

    /// Fires if the tick is due and schedules the following one.
    ///
    /// Late ticks are not replayed: the next deadline is one interval after
    /// the tick that was due, skipping any that were missed entirely.
    pub fn fire(&mut self, now: Duration) -> Option<TimerId> {
        let armed = self.armed.as_mut()?;
        if now < armed.deadline {
            return None;
        }

        armed.deadline = if armed.interval > Duration::ZERO {
            let interval = armed.interval.as_nanos();
            let steps = (now - armed.deadline).as_nanos() / interval + 1;
            let offset = u64::try_from(interval.saturating_mul(steps)).unwrap_or(u64::MAX);
            armed.deadline.saturating_add(Duration::from_nanos(offset))
        } else {
            now
        };
        Some(armed.id)
    }
}
