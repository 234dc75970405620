#![forbid(unsafe_code)]

//! Animation primitives for disclosure panels.
//!
//! - [`easing`]: named curves and a CSS `cubic-bezier()` solver.
//! - [`keyframes`]: the two-frame visual state (opacity, vertical offset) and
//!   a [`Transition`] that interpolates between frames over a fixed duration.
//! - [`platform`]: the [`AnimationPlatform`] seam the host implements, plus
//!   [`SimulatedPlatform`] for deterministic runs and [`UnsupportedPlatform`]
//!   for environments without an animation capability.
//!
//! # Invariants
//!
//! 1. `Animation::value()` is always in `[0.0, 1.0]`.
//! 2. A transition is complete exactly when its elapsed time reaches its
//!    duration; zero durations are clamped to 1ns.

use std::time::Duration;

pub mod easing;
pub mod keyframes;
pub mod platform;

pub use easing::{CubicBezier, Easing, EasingParseError};
pub use keyframes::{Frame, Keyframes, Transition};
pub use platform::{
    AnimationPlatform, PlatformAnimationId, SimulatedPlatform, Timing, UnsupportedPlatform,
};

/// A time-driven animation producing a normalized value.
pub trait Animation {
    /// Advance by `dt`.
    fn tick(&mut self, dt: Duration);

    /// Whether the animation reached its end.
    fn is_complete(&self) -> bool;

    /// Current normalized value in `[0.0, 1.0]`.
    fn value(&self) -> f32;

    /// Return to the initial state.
    fn reset(&mut self);
}
