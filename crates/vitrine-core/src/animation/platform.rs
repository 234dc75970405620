#![forbid(unsafe_code)]

//! The platform animation seam.
//!
//! A browser host implements [`AnimationPlatform`] over the Web Animations
//! API: `play` maps to `element.animate(...)`, `cancel`/`finish` to the same
//! named methods, and completion notifications to `onfinish`. Notifications
//! are *pulled*: the runtime asks for the next notification time and drains
//! due ones when the host advances the clock.
//!
//! [`SimulatedPlatform`] is the deterministic implementation used by tests and
//! the replay CLI. It can withhold completion notifications (a throttled
//! background tab) and can deliver notifications for animations that were
//! already cancelled (a stale callback racing a restart).
//!
//! [`UnsupportedPlatform`] reports no animation capability at all.
//!
//! # Invariants
//!
//! 1. A finished or cancelled animation never produces a notification, unless
//!    stale notifications are explicitly enabled on the simulator.
//! 2. `next_notification()` is `Some(t)` iff `take_notifications(t)` returns
//!    at least one id.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{Animation, Easing, Frame, Keyframes, Transition};
use crate::dom::ElementId;

/// Identifier of an animation started on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformAnimationId(u64);

impl PlatformAnimationId {
    /// Raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Duration and easing of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Nominal duration.
    pub duration: Duration,
    /// Timing curve.
    pub easing: Easing,
}

/// Host animation capability.
pub trait AnimationPlatform {
    /// Whether animations can run at all.
    fn supports_animation(&self) -> bool;

    /// Start animating `target`; `None` when the capability is absent.
    fn play(
        &mut self,
        target: ElementId,
        keyframes: Keyframes,
        timing: Timing,
        now: Duration,
    ) -> Option<PlatformAnimationId>;

    /// Stop immediately and discard callbacks.
    fn cancel(&mut self, id: PlatformAnimationId);

    /// Jump to the end frame without a notification.
    fn finish(&mut self, id: PlatformAnimationId);

    /// Current interpolated frame of a running animation.
    fn sample(&self, id: PlatformAnimationId, now: Duration) -> Option<Frame>;

    /// Earliest pending completion notification.
    fn next_notification(&self) -> Option<Duration>;

    /// Drain completion notifications due at or before `now`, in due order.
    fn take_notifications(&mut self, now: Duration) -> Vec<PlatformAnimationId>;
}

// ---------------------------------------------------------------------------
// Simulated platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SimAnimation {
    target: ElementId,
    transition: Transition,
    started_at: Duration,
    notify_at: Option<Duration>,
    cancelled: bool,
}

/// Deterministic in-memory animation platform.
#[derive(Debug, Clone)]
pub struct SimulatedPlatform {
    animations: BTreeMap<PlatformAnimationId, SimAnimation>,
    next_id: u64,
    deliver: bool,
    stale_notifications: bool,
    played: u64,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlatform {
    /// Platform that delivers every completion on time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            animations: BTreeMap::new(),
            next_id: 0,
            deliver: true,
            stale_notifications: false,
            played: 0,
        }
    }

    /// Also deliver completions for animations that were cancelled.
    #[must_use]
    pub fn with_stale_notifications(mut self) -> Self {
        self.stale_notifications = true;
        self
    }

    /// Drop (or resume delivering) completion notifications.
    ///
    /// Withholding also discards notifications already scheduled, like a
    /// backgrounded tab that never runs the pending callbacks.
    pub fn set_withhold_notifications(&mut self, withhold: bool) {
        self.deliver = !withhold;
        if withhold {
            let mut dropped = 0usize;
            for anim in self.animations.values_mut() {
                dropped += usize::from(anim.notify_at.take().is_some());
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(dropped, "simulated platform withholding notifications");
            #[cfg(not(feature = "tracing"))]
            let _ = dropped;
        }
    }

    /// Total animations started.
    #[must_use]
    pub const fn played(&self) -> u64 {
        self.played
    }

    /// Animations not cancelled whose nominal end is after `now`.
    #[must_use]
    pub fn running_at(&self, now: Duration) -> usize {
        self.animations
            .values()
            .filter(|a| !a.cancelled && a.started_at + a.transition.duration() > now)
            .count()
    }

    /// Element an animation targets.
    #[must_use]
    pub fn target_of(&self, id: PlatformAnimationId) -> Option<ElementId> {
        self.animations.get(&id).map(|a| a.target)
    }
}

impl AnimationPlatform for SimulatedPlatform {
    fn supports_animation(&self) -> bool {
        true
    }

    fn play(
        &mut self,
        target: ElementId,
        keyframes: Keyframes,
        timing: Timing,
        now: Duration,
    ) -> Option<PlatformAnimationId> {
        let id = PlatformAnimationId(self.next_id);
        self.next_id += 1;
        self.played += 1;
        let transition = Transition::new(keyframes, timing.duration, timing.easing);
        let notify_at = self.deliver.then(|| now + transition.duration());
        self.animations.insert(
            id,
            SimAnimation {
                target,
                transition,
                started_at: now,
                notify_at,
                cancelled: false,
            },
        );
        Some(id)
    }

    fn cancel(&mut self, id: PlatformAnimationId) {
        if self.stale_notifications {
            if let Some(anim) = self.animations.get_mut(&id) {
                anim.cancelled = true;
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    animation = id.get(),
                    notify = anim.notify_at.is_some(),
                    "cancelled animation keeps its notification"
                );
            }
        } else {
            self.animations.remove(&id);
        }
    }

    fn finish(&mut self, id: PlatformAnimationId) {
        self.animations.remove(&id);
    }

    fn sample(&self, id: PlatformAnimationId, now: Duration) -> Option<Frame> {
        let anim = self.animations.get(&id)?;
        if anim.cancelled {
            return None;
        }
        let mut transition = anim.transition.clone();
        transition.reset();
        transition.tick(now.saturating_sub(anim.started_at));
        Some(transition.frame())
    }

    fn next_notification(&self) -> Option<Duration> {
        self.animations.values().filter_map(|a| a.notify_at).min()
    }

    fn take_notifications(&mut self, now: Duration) -> Vec<PlatformAnimationId> {
        let mut due: Vec<(Duration, PlatformAnimationId)> = self
            .animations
            .iter()
            .filter_map(|(id, a)| a.notify_at.filter(|&t| t <= now).map(|t| (t, *id)))
            .collect();
        due.sort_unstable();
        for (_, id) in &due {
            self.animations.remove(id);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(count = due.len(), "simulated completions delivered");
        due.into_iter().map(|(_, id)| id).collect()
    }
}

// ---------------------------------------------------------------------------
// Unsupported platform
// ---------------------------------------------------------------------------

/// Platform without an animation capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlatform;

impl AnimationPlatform for UnsupportedPlatform {
    fn supports_animation(&self) -> bool {
        false
    }

    fn play(
        &mut self,
        _target: ElementId,
        _keyframes: Keyframes,
        _timing: Timing,
        _now: Duration,
    ) -> Option<PlatformAnimationId> {
        None
    }

    fn cancel(&mut self, _id: PlatformAnimationId) {}

    fn finish(&mut self, _id: PlatformAnimationId) {}

    fn sample(&self, _id: PlatformAnimationId, _now: Duration) -> Option<Frame> {
        None
    }

    fn next_notification(&self) -> Option<Duration> {
        None
    }

    fn take_notifications(&mut self, _now: Duration) -> Vec<PlatformAnimationId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    const MS_350: Duration = Duration::from_millis(350);

    fn timing() -> Timing {
        Timing {
            duration: MS_350,
            easing: Easing::Linear,
        }
    }

    fn kf() -> Keyframes {
        Keyframes::new(Frame::hidden(-16.0), Frame::SHOWN)
    }

    #[test]
    fn delivers_completion_at_nominal_end() {
        let target = Document::new().root();
        let mut p = SimulatedPlatform::new();
        let id = p.play(target, kf(), timing(), Duration::ZERO).unwrap();
        assert_eq!(p.next_notification(), Some(MS_350));
        assert!(p.take_notifications(Duration::from_millis(349)).is_empty());
        assert_eq!(p.take_notifications(MS_350), vec![id]);
        assert_eq!(p.next_notification(), None);
    }

    #[test]
    fn cancelled_animation_is_silent_by_default() {
        let target = Document::new().root();
        let mut p = SimulatedPlatform::new();
        let id = p.play(target, kf(), timing(), Duration::ZERO).unwrap();
        p.cancel(id);
        assert_eq!(p.next_notification(), None);
        assert_eq!(p.sample(id, Duration::from_millis(100)), None);
    }

    #[test]
    fn stale_mode_still_notifies_cancelled() {
        let target = Document::new().root();
        let mut p = SimulatedPlatform::new().with_stale_notifications();
        let id = p.play(target, kf(), timing(), Duration::ZERO).unwrap();
        p.cancel(id);
        assert_eq!(p.take_notifications(MS_350), vec![id]);
    }

    #[cfg(feature = "tracing")]
    #[tracing_test::traced_test]
    #[test]
    fn simulator_traces_withheld_and_stale_notifications() {
        let target = Document::new().root();
        let mut p = SimulatedPlatform::new().with_stale_notifications();
        let id = p.play(target, kf(), timing(), Duration::ZERO).unwrap();
        p.cancel(id);
        assert!(logs_contain("cancelled animation keeps its notification"));
        p.set_withhold_notifications(true);
        assert!(logs_contain("withholding notifications"));
        assert!(logs_contain("dropped=1"));
    }

    #[test]
    fn withholding_drops_pending_notifications() {
        let target = Document::new().root();
        let mut p = SimulatedPlatform::new();
        p.play(target, kf(), timing(), Duration::ZERO);
        p.set_withhold_notifications(true);
        assert_eq!(p.next_notification(), None);
        assert!(p.take_notifications(Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn sampling_interpolates() {
        let target = Document::new().root();
        let mut p = SimulatedPlatform::new();
        let id = p.play(target, kf(), timing(), Duration::from_millis(100)).unwrap();
        let frame = p.sample(id, Duration::from_millis(275)).unwrap();
        assert!((frame.opacity - 0.5).abs() < 1e-3);
    }

    #[test]
    fn unsupported_platform_never_plays() {
        let target = Document::new().root();
        let mut p = UnsupportedPlatform;
        assert!(!p.supports_animation());
        assert_eq!(p.play(target, kf(), timing(), Duration::ZERO), None);
    }
}
