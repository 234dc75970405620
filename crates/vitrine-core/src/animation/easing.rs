#![forbid(unsafe_code)]

//! Timing curves.
//!
//! [`Easing`] covers the CSS timing-function keywords and arbitrary
//! `cubic-bezier(x1, y1, x2, y2)` curves. Bezier curves are evaluated by
//! solving `x(t) = progress` with Newton iteration, falling back to bisection
//! when the slope is too flat for Newton to converge.
//!
//! # Failure Modes
//!
//! - Control-point x outside `[0, 1]`: rejected at parse/construction time,
//!   since the curve would not be a function of time.
//! - Progress outside `[0, 1]`: clamped before evaluation.

use std::fmt;
use std::str::FromStr;

const NEWTON_ITERATIONS: usize = 8;
const NEWTON_MIN_SLOPE: f32 = 1e-3;
const SOLVE_EPSILON: f32 = 1e-6;
const BISECTION_ITERATIONS: usize = 32;

/// A CSS `cubic-bezier()` curve with fixed endpoints (0,0) and (1,1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl CubicBezier {
    /// Build a curve; `None` when an x control point is outside `[0, 1]`.
    #[must_use]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<Self> {
        let valid_x = |x: f32| x.is_finite() && (0.0..=1.0).contains(&x);
        if !valid_x(x1) || !valid_x(x2) || !y1.is_finite() || !y2.is_finite() {
            return None;
        }
        Some(Self { x1, y1, x2, y2 })
    }

    /// Control points as `(x1, y1, x2, y2)`.
    #[must_use]
    pub const fn control_points(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    fn sample(a1: f32, a2: f32, t: f32) -> f32 {
        let u = 1.0 - t;
        3.0 * u * u * t * a1 + 3.0 * u * t * t * a2 + t * t * t
    }

    fn slope(a1: f32, a2: f32, t: f32) -> f32 {
        let u = 1.0 - t;
        3.0 * u * u * a1 + 6.0 * u * t * (a2 - a1) + 3.0 * t * t * (1.0 - a2)
    }

    fn solve_t(&self, x: f32) -> f32 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let err = Self::sample(self.x1, self.x2, t) - x;
            if err.abs() < SOLVE_EPSILON {
                return t;
            }
            let d = Self::slope(self.x1, self.x2, t);
            if d.abs() < NEWTON_MIN_SLOPE {
                break;
            }
            t -= err / d;
        }

        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        t = x;
        for _ in 0..BISECTION_ITERATIONS {
            let value = Self::sample(self.x1, self.x2, t);
            if (value - x).abs() < SOLVE_EPSILON {
                break;
            }
            if value < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) * 0.5;
        }
        t
    }

    /// Eased output for `progress` in `[0, 1]`.
    #[must_use]
    pub fn apply(&self, progress: f32) -> f32 {
        let x = progress.clamp(0.0, 1.0);
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        Self::sample(self.y1, self.y2, self.solve_t(x))
    }
}

/// Timing function applied to transition progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    /// Constant speed.
    Linear,
    /// A cubic-bezier curve (CSS keywords map to their standard curves).
    Bezier(CubicBezier),
}

impl Easing {
    /// CSS `ease`.
    pub const EASE: Self = Self::Bezier(CubicBezier {
        x1: 0.25,
        y1: 0.1,
        x2: 0.25,
        y2: 1.0,
    });
    /// CSS `ease-in`.
    pub const EASE_IN: Self = Self::Bezier(CubicBezier {
        x1: 0.42,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    });
    /// CSS `ease-out`.
    pub const EASE_OUT: Self = Self::Bezier(CubicBezier {
        x1: 0.0,
        y1: 0.0,
        x2: 0.58,
        y2: 1.0,
    });
    /// CSS `ease-in-out`.
    pub const EASE_IN_OUT: Self = Self::Bezier(CubicBezier {
        x1: 0.42,
        y1: 0.0,
        x2: 0.58,
        y2: 1.0,
    });
    /// The menu panel curve, `cubic-bezier(.2,.7,.3,1)`.
    pub const PANEL: Self = Self::Bezier(CubicBezier {
        x1: 0.2,
        y1: 0.7,
        x2: 0.3,
        y2: 1.0,
    });

    /// Eased output for `progress` in `[0, 1]`.
    #[must_use]
    pub fn apply(&self, progress: f32) -> f32 {
        match self {
            Self::Linear => progress.clamp(0.0, 1.0),
            Self::Bezier(curve) => curve.apply(progress),
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::PANEL
    }
}

/// A timing-function string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EasingParseError {
    /// The offending input.
    pub input: String,
}

impl fmt::Display for EasingParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized timing function: {:?}", self.input)
    }
}

impl std::error::Error for EasingParseError {}

impl FromStr for Easing {
    type Err = EasingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || EasingParseError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        match trimmed {
            "linear" => return Ok(Self::Linear),
            "ease" => return Ok(Self::EASE),
            "ease-in" => return Ok(Self::EASE_IN),
            "ease-out" => return Ok(Self::EASE_OUT),
            "ease-in-out" => return Ok(Self::EASE_IN_OUT),
            _ => {}
        }
        let args = trimmed
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(err)?;
        let values: Vec<f32> = args
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|_| err())?;
        let [x1, y1, x2, y2] = values.as_slice() else {
            return Err(err());
        };
        CubicBezier::new(*x1, *y1, *x2, *y2)
            .map(Self::Bezier)
            .ok_or_else(err)
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Bezier(c) => write!(f, "cubic-bezier({},{},{},{})", c.x1, c.y1, c.x2, c.y2),
        }
    }
}
