#![forbid(unsafe_code)]

//! Host-driven monotonic time and deadline scheduling.
//!
//! Behaviors never read the wall clock directly. The host either advances a
//! [`DeterministicClock`] explicitly (tests, replays, WASM frame callbacks) or
//! uses [`WallClock`] backed by `web-time`, which works on `wasm32` too.
//!
//! [`TimerQueue`] holds deadline-tagged payloads. It does not fire anything on
//! its own; the runtime pops due entries when the host advances time.
//!
//! # Invariants
//!
//! 1. Entries pop in deadline order; equal deadlines pop in scheduling order.
//! 2. A cancelled entry never pops.
//! 3. Timer ids are never reused within one queue.

use core::time::Duration;
use std::collections::BTreeMap;

use ahash::AHashMap;

/// Monotonic time source.
pub trait Clock {
    /// Time since the clock's origin.
    fn now(&self) -> Duration;
}

/// Deterministic monotonic clock controlled by the host.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Set current monotonic time. Moving backwards is ignored.
    pub fn set(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }
}

impl Clock for DeterministicClock {
    fn now(&self) -> Duration {
        self.now
    }
}

/// Real monotonic clock, origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: web_time::Instant,
}

impl WallClock {
    /// Start a clock now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: web_time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered timer queue.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    entries: BTreeMap<(Duration, TimerId), T>,
    deadlines: AHashMap<TimerId, Duration>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            deadlines: AHashMap::new(),
            next_id: 0,
        }
    }

    /// Schedule `payload` to become due at `deadline`.
    pub fn schedule(&mut self, deadline: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert((deadline, id), payload);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancel a timer. Returns its payload if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.deadlines.remove(&id)?;
        self.entries.remove(&(deadline, id))
    }

    /// Whether `id` is still pending.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest entry whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, Duration, T)> {
        let (&(deadline, id), _) = self.entries.iter().next()?;
        if deadline > now {
            return None;
        }
        let payload = self.entries.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((id, deadline, payload))
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn pops_in_deadline_then_fifo_order() {
        let mut q = TimerQueue::new();
        q.schedule(ms(50), "late");
        q.schedule(ms(10), "first");
        q.schedule(ms(10), "second");

        assert_eq!(q.pop_due(ms(5)), None);
        assert_eq!(q.pop_due(ms(60)).map(|(_, _, p)| p), Some("first"));
        assert_eq!(q.pop_due(ms(60)).map(|(_, _, p)| p), Some("second"));
        assert_eq!(q.pop_due(ms(60)).map(|(_, _, p)| p), Some("late"));
        assert!(q.is_empty());
    }

    #[test]
    fn cancelled_timers_never_pop() {
        let mut q = TimerQueue::new();
        let id = q.schedule(ms(10), 1);
        q.schedule(ms(20), 2);
        assert_eq!(q.cancel(id), Some(1));
        assert_eq!(q.cancel(id), None);
        assert!(!q.is_pending(id));
        assert_eq!(q.next_deadline(), Some(ms(20)));
        assert_eq!(q.pop_due(ms(100)).map(|(_, _, p)| p), Some(2));
    }

    #[test]
    fn deterministic_clock_is_monotonic() {
        let mut clock = DeterministicClock::new();
        clock.advance(ms(30));
        clock.set(ms(10));
        assert_eq!(clock.now(), ms(30));
        clock.set(ms(45));
        assert_eq!(clock.now(), ms(45));
    }
}
