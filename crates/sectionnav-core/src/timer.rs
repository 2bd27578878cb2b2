//! Cancellable one-shot timers for single-threaded state machines
//!
//! Components never sleep. They schedule a [`Timer`], report its deadline
//! through `next_deadline()`, and collect it with [`Timer::take_due`] when the
//! driver polls them with the current time.

use std::time::Duration;

use tokio::time::Instant;

/// A pending one-shot timer carrying a value
///
/// Scheduling replaces whatever was pending, so timers never accumulate.
#[derive(Debug, Clone)]
pub struct Timer<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for Timer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> Timer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `value` to fire `delay` after `now`, replacing any pending value
    pub fn schedule(&mut self, now: Instant, delay: Duration, value: T) {
        self.pending = Some((now + delay, value));
    }

    /// Drop the pending value, if any
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Take the value if its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((at, _)) if at <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }
}

/// A timer with no payload
pub type Deadline = Timer<()>;

impl Deadline {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.schedule(now, delay, ());
    }

    /// True exactly once, when the deadline has passed
    pub fn fire(&mut self, now: Instant) -> bool {
        self.take_due(now).is_some()
    }
}

/// Earliest of several optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}
