#![forbid(unsafe_code)]

//! Two-frame visual transitions.
//!
//! A [`Frame`] is the animated part of a panel's style: opacity and vertical
//! offset. [`Keyframes`] pairs a start and end frame; [`Transition`] plays them
//! over a fixed duration with an [`Easing`].

use std::time::Duration;

use super::{Animation, Easing};

/// Animated visual properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Opacity in `[0.0, 1.0]`.
    pub opacity: f32,
    /// Vertical translation in CSS pixels.
    pub offset_y: f32,
}

impl Frame {
    /// Fully visible, in place.
    pub const SHOWN: Self = Self {
        opacity: 1.0,
        offset_y: 0.0,
    };

    /// Transparent, shifted by `offset_y` pixels.
    #[must_use]
    pub const fn hidden(offset_y: f32) -> Self {
        Self {
            opacity: 0.0,
            offset_y,
        }
    }

    /// Linear interpolation; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            opacity: self.opacity + (to.opacity - self.opacity) * t,
            offset_y: self.offset_y + (to.offset_y - self.offset_y) * t,
        }
    }
}

/// Start and end frames of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframes {
    /// Frame at progress 0.
    pub from: Frame,
    /// Frame at progress 1.
    pub to: Frame,
}

impl Keyframes {
    /// Build a keyframe pair.
    #[must_use]
    pub const fn new(from: Frame, to: Frame) -> Self {
        Self { from, to }
    }

    /// Same frames, played backwards.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

/// A fixed-duration, eased transition between two frames.
#[derive(Debug, Clone)]
pub struct Transition {
    keyframes: Keyframes,
    duration: Duration,
    easing: Easing,
    elapsed: Duration,
}

impl Transition {
    /// Create a transition. Zero durations are clamped to 1ns.
    #[must_use]
    pub fn new(keyframes: Keyframes, duration: Duration, easing: Easing) -> Self {
        Self {
            keyframes,
            duration: if duration.is_zero() {
                Duration::from_nanos(1)
            } else {
                duration
            },
            easing,
            elapsed: Duration::ZERO,
        }
    }

    /// Total duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Time played so far.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Keyframes being played.
    #[must_use]
    pub const fn keyframes(&self) -> Keyframes {
        self.keyframes
    }

    /// Jump to the end.
    pub fn finish(&mut self) {
        self.elapsed = self.duration;
    }

    /// Interpolated frame at the current position.
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.keyframes.from.lerp(self.keyframes.to, self.value())
    }

    fn linear_progress(&self) -> f32 {
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
    }
}

impl Animation for Transition {
    fn tick(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    fn value(&self) -> f32 {
        self.easing.apply(self.linear_progress())
    }

    fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_100: Duration = Duration::from_millis(100);

    fn open_kf() -> Keyframes {
        Keyframes::new(Frame::hidden(-16.0), Frame::SHOWN)
    }

    #[test]
    fn linear_transition_interpolates() {
        let mut t = Transition::new(open_kf(), MS_100, Easing::Linear);
        assert_eq!(t.frame(), Frame::hidden(-16.0));
        t.tick(Duration::from_millis(50));
        let mid = t.frame();
        assert!((mid.opacity - 0.5).abs() < 1e-4);
        assert!((mid.offset_y + 8.0).abs() < 1e-3);
        t.tick(Duration::from_secs(5));
        assert!(t.is_complete());
        assert_eq!(t.frame(), Frame::SHOWN);
    }

    #[test]
    fn finish_and_reset() {
        let mut t = Transition::new(open_kf().reversed(), MS_100, Easing::PANEL);
        t.finish();
        assert!(t.is_complete());
        assert_eq!(t.frame(), Frame::hidden(-16.0));
        t.reset();
        assert_eq!(t.elapsed(), Duration::ZERO);
        assert_eq!(t.frame(), Frame::SHOWN);
    }

    #[test]
    fn zero_duration_is_clamped() {
        let mut t = Transition::new(open_kf(), Duration::ZERO, Easing::Linear);
        assert!(!t.is_complete());
        t.tick(Duration::from_nanos(1));
        assert!(t.is_complete());
    }
}
