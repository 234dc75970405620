#![forbid(unsafe_code)]

//! Logical disclosure state.
//!
//! ```text
//!            request_open                settle
//!   Closed ───────────────▶ Opening ───────────────▶ Open
//!     ▲                      │   ▲                     │
//!     │ settle  request_close│   │request_open         │ request_close
//!     │                      ▼   │                     │
//!     └──────────────────── Closing ◀──────────────────┘
//! ```
//!
//! There is no terminal state; an instance lives until it is unbound.

use std::fmt;

/// Where an instance is in its open/close cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicalState {
    /// Collapsed and settled.
    #[default]
    Closed,
    /// Open transition in flight.
    Opening,
    /// Expanded and settled.
    Open,
    /// Close transition in flight.
    Closing,
}

impl LogicalState {
    /// `Opening` or `Open`: the instance counts toward its group's
    /// single-expanded limit.
    #[must_use]
    pub const fn is_expanded(self) -> bool {
        matches!(self, Self::Opening | Self::Open)
    }

    /// A transition is in flight.
    #[must_use]
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// Lower-case name, as used in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for LogicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward `Open`.
    Opening,
    /// Toward `Closed`.
    Closing,
}

impl Direction {
    /// State while this transition runs.
    #[must_use]
    pub const fn in_flight(self) -> LogicalState {
        match self {
            Self::Opening => LogicalState::Opening,
            Self::Closing => LogicalState::Closing,
        }
    }

    /// State once this transition settles.
    #[must_use]
    pub const fn settled(self) -> LogicalState {
        match self {
            Self::Opening => LogicalState::Open,
            Self::Closing => LogicalState::Closed,
        }
    }

    /// Lower-case name, as used in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
