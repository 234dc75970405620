#![forbid(unsafe_code)]

//! Per-instance transition driver.
//!
//! The driver owns at most one [`AnimationHandle`]. Starting a transition
//! always cancels the previous handle first, writes the canonical start frame,
//! asks the platform to play, and arms a fallback timer at
//! `duration + slack`. Whichever arrives first, the platform completion or
//! the fallback, settles the transition; the other is then stale.
//!
//! # Invariants
//!
//! 1. At most one non-cancelled handle per driver.
//! 2. A completion or fallback settles only when it matches the current
//!    handle (platform id or generation). Everything else is stale.
//! 3. Only opacity and vertical offset are written here.
//! 4. A handle has no `cancelled` flag. Cancelling takes it out of the
//!    driver and drops it, so "cancelled" means "no longer current", and
//!    invariant 2 filters every callback that still names it.
//!
//! # Failure Modes
//!
//! - Platform without animation support: [`AnimationDriver::start`] writes
//!   the end frame and returns [`Started::Immediate`]; the caller settles in
//!   the same turn.
//! - Completion never delivered: the fallback timer force-settles.

use std::time::Duration;

use tracing::{debug, trace};
use vitrine_core::animation::{Frame, Keyframes, PlatformAnimationId, Timing};
use vitrine_core::clock::TimerId;
use vitrine_core::dom::ElementId;

use crate::registry::InstanceKey;
use crate::state::Direction;
use crate::turn::{TimerEvent, Turn};

/// A running transition.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationHandle {
    generation: u64,
    direction: Direction,
    started_at: Duration,
    deadline: Duration,
    platform_id: PlatformAnimationId,
    fallback: TimerId,
}

impl AnimationHandle {
    /// Identity of this handle within its driver.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Transition direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Start time.
    #[must_use]
    pub const fn started_at(&self) -> Duration {
        self.started_at
    }

    /// Fallback deadline: `started_at + duration + slack`.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Platform animation being driven.
    #[must_use]
    pub const fn platform_id(&self) -> PlatformAnimationId {
        self.platform_id
    }
}

/// Outcome of [`AnimationDriver::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Started {
    /// A transition is running under this generation.
    Animating(u64),
    /// No animation capability; the end frame is already applied.
    Immediate,
}

/// Transition driver for one instance.
#[derive(Debug, Clone)]
pub struct AnimationDriver {
    instance: InstanceKey,
    timing: Timing,
    slack: Duration,
    closed: Frame,
    current: Option<AnimationHandle>,
    generations: u64,
}

impl AnimationDriver {
    /// Driver with the given timing, fallback slack, and closed frame.
    #[must_use]
    pub fn new(instance: InstanceKey, timing: Timing, slack: Duration, closed: Frame) -> Self {
        Self {
            instance,
            timing,
            slack,
            closed,
            current: None,
            generations: 0,
        }
    }

    /// The live handle, if a transition is running.
    #[must_use]
    pub const fn current(&self) -> Option<&AnimationHandle> {
        self.current.as_ref()
    }

    /// Canonical keyframes for `direction`.
    #[must_use]
    pub fn keyframes(&self, direction: Direction) -> Keyframes {
        let opening = Keyframes::new(self.closed, Frame::SHOWN);
        match direction {
            Direction::Opening => opening,
            Direction::Closing => opening.reversed(),
        }
    }

    /// Start a transition on `panel`, replacing any running one.
    ///
    /// The start frame is the canonical one for `direction`, not the current
    /// visual state, so a restart mid-flight jumps.
    pub fn start(&mut self, direction: Direction, panel: ElementId, turn: &mut Turn<'_>) -> Started {
        self.cancel(turn);
        let keyframes = self.keyframes(direction);
        apply_frame(turn, panel, keyframes.from);

        let Some(platform_id) = turn.platform.play(panel, keyframes, self.timing, turn.now) else {
            apply_frame(turn, panel, keyframes.to);
            return Started::Immediate;
        };

        self.generations += 1;
        let generation = self.generations;
        let deadline = turn.now + self.timing.duration + self.slack;
        let fallback = turn.timers.schedule(
            deadline,
            TimerEvent::Fallback {
                instance: self.instance,
                generation,
            },
        );
        trace!(
            instance = %self.instance,
            %direction,
            generation,
            deadline_ms = deadline.as_millis() as u64,
            "transition started"
        );
        self.current = Some(AnimationHandle {
            generation,
            direction,
            started_at: turn.now,
            deadline,
            platform_id,
            fallback,
        });
        Started::Animating(generation)
    }

    /// Cancel the running transition, if any. Its callbacks become stale.
    pub fn cancel(&mut self, turn: &mut Turn<'_>) -> Option<AnimationHandle> {
        let handle = self.current.take()?;
        turn.platform.cancel(handle.platform_id);
        turn.timers.cancel(handle.fallback);
        trace!(
            instance = %self.instance,
            generation = handle.generation,
            "transition cancelled"
        );
        Some(handle)
    }

    /// Platform reported completion of `id`.
    ///
    /// Returns the settled direction, or `None` for a stale completion.
    pub fn complete(
        &mut self,
        id: PlatformAnimationId,
        panel: ElementId,
        turn: &mut Turn<'_>,
    ) -> Option<Direction> {
        if self.current.as_ref().map(AnimationHandle::platform_id) != Some(id) {
            debug!(instance = %self.instance, animation = id.get(), "stale completion ignored");
            return None;
        }
        let handle = self.current.take()?;
        turn.timers.cancel(handle.fallback);
        apply_frame(turn, panel, self.keyframes(handle.direction).to);
        Some(handle.direction)
    }

    /// Fallback timer for `generation` fired.
    ///
    /// Returns the settled direction, or `None` when the handle was already
    /// replaced or settled.
    pub fn force_settle(
        &mut self,
        generation: u64,
        panel: ElementId,
        turn: &mut Turn<'_>,
    ) -> Option<Direction> {
        if self.current.as_ref().map(AnimationHandle::generation) != Some(generation) {
            debug!(instance = %self.instance, generation, "stale fallback ignored");
            return None;
        }
        let handle = self.current.take()?;
        turn.platform.finish(handle.platform_id);
        debug!(
            instance = %self.instance,
            generation,
            direction = %handle.direction,
            "completion missing, fallback settled transition"
        );
        apply_frame(turn, panel, self.keyframes(handle.direction).to);
        Some(handle.direction)
    }

    /// Copy the platform's current frame onto `panel`.
    pub fn sample(&self, panel: ElementId, turn: &mut Turn<'_>) {
        let Some(handle) = &self.current else {
            return;
        };
        if let Some(frame) = turn.platform.sample(handle.platform_id, turn.now) {
            apply_frame(turn, panel, frame);
        }
    }
}

fn apply_frame(turn: &mut Turn<'_>, panel: ElementId, frame: Frame) {
    turn.doc.set_visual(panel, frame.opacity, frame.offset_y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::animation::{Easing, SimulatedPlatform, UnsupportedPlatform};
    use vitrine_core::clock::TimerQueue;
    use vitrine_core::dom::Document;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn driver() -> AnimationDriver {
        AnimationDriver::new(
            InstanceKey::new(0),
            Timing {
                duration: ms(350),
                easing: Easing::PANEL,
            },
            ms(50),
            Frame::hidden(-16.0),
        )
    }

    #[test]
    fn start_writes_from_frame_and_arms_fallback() {
        let mut doc = Document::new();
        let panel = doc.append_new(doc.root(), "div");
        let mut platform = SimulatedPlatform::new();
        let mut timers = TimerQueue::new();
        let mut turn = Turn {
            doc: &mut doc,
            platform: &mut platform,
            timers: &mut timers,
            now: ms(100),
        };
        let mut d = driver();
        assert_eq!(d.start(Direction::Opening, panel, &mut turn), Started::Animating(1));
        assert_eq!(turn.doc.style(panel).opacity, 0.0);
        assert_eq!(turn.doc.style(panel).offset_y, -16.0);
        assert_eq!(d.current().map(AnimationHandle::deadline), Some(ms(500)));
        assert_eq!(turn.timers.next_deadline(), Some(ms(500)));
    }

    #[test]
    fn restart_cancels_previous_handle() {
        let mut doc = Document::new();
        let panel = doc.append_new(doc.root(), "div");
        let mut platform = SimulatedPlatform::new();
        let mut timers = TimerQueue::new();
        let mut turn = Turn {
            doc: &mut doc,
            platform: &mut platform,
            timers: &mut timers,
            now: Duration::ZERO,
        };
        let mut d = driver();
        d.start(Direction::Opening, panel, &mut turn);
        let first = d.current().map(AnimationHandle::platform_id).unwrap();
        turn.now = ms(100);
        assert_eq!(d.start(Direction::Closing, panel, &mut turn), Started::Animating(2));
        assert_eq!(turn.timers.len(), 1);
        assert_eq!(turn.doc.style(panel).opacity, 1.0);
        assert_eq!(d.complete(first, panel, &mut turn), None);
        assert_eq!(d.force_settle(1, panel, &mut turn), None);
        assert_eq!(d.force_settle(2, panel, &mut turn), Some(Direction::Closing));
        assert_eq!(turn.doc.style(panel).opacity, 0.0);
        assert!(d.current().is_none());
    }

    #[test]
    fn completion_settles_and_disarms_fallback() {
        let mut doc = Document::new();
        let panel = doc.append_new(doc.root(), "div");
        let mut platform = SimulatedPlatform::new();
        let mut timers = TimerQueue::new();
        let mut turn = Turn {
            doc: &mut doc,
            platform: &mut platform,
            timers: &mut timers,
            now: Duration::ZERO,
        };
        let mut d = driver();
        d.start(Direction::Opening, panel, &mut turn);
        let ids = turn.platform.take_notifications(ms(350));
        assert_eq!(ids.len(), 1);
        assert_eq!(d.complete(ids[0], panel, &mut turn), Some(Direction::Opening));
        assert!(turn.timers.is_empty());
        assert_eq!(turn.doc.style(panel).opacity, 1.0);
    }

    #[test]
    fn cancelled_handle_callbacks_are_stale() {
        let mut doc = Document::new();
        let panel = doc.append_new(doc.root(), "div");
        let mut platform = SimulatedPlatform::new().with_stale_notifications();
        let mut timers = TimerQueue::new();
        let mut turn = Turn {
            doc: &mut doc,
            platform: &mut platform,
            timers: &mut timers,
            now: Duration::ZERO,
        };
        let mut d = driver();
        d.start(Direction::Opening, panel, &mut turn);
        let cancelled = d.cancel(&mut turn).unwrap();
        assert!(d.current().is_none());
        assert!(turn.timers.is_empty());

        let ids = turn.platform.take_notifications(ms(350));
        assert_eq!(ids, vec![cancelled.platform_id()]);
        assert_eq!(d.complete(ids[0], panel, &mut turn), None);
        assert_eq!(d.force_settle(1, panel, &mut turn), None);
        assert_eq!(turn.doc.style(panel).opacity, 0.0);
    }

    #[test]
    fn unsupported_platform_applies_end_frame() {
        let mut doc = Document::new();
        let panel = doc.append_new(doc.root(), "div");
        let mut platform = UnsupportedPlatform;
        let mut timers = TimerQueue::new();
        let mut turn = Turn {
            doc: &mut doc,
            platform: &mut platform,
            timers: &mut timers,
            now: Duration::ZERO,
        };
        let mut d = driver();
        assert_eq!(d.start(Direction::Opening, panel, &mut turn), Started::Immediate);
        assert_eq!(turn.doc.style(panel).opacity, 1.0);
        assert!(turn.timers.is_empty());
        assert!(d.current().is_none());
    }
}
