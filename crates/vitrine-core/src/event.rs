#![forbid(unsafe_code)]

//! Canonical input events.
//!
//! The host translates platform events into these values and hands them to a
//! behavior runtime. All events derive `Clone`, `PartialEq`, and `Eq` for use
//! in tests and scripted replays.
//!
//! # Design Notes
//!
//! - Every event carries the element it was dispatched at (`target`); routing
//!   is done by containment, the way delegated DOM listeners work.
//! - Hover events are only meaningful for fine pointers; the router checks
//!   [`PointerCapability`] rather than the event itself.
//! - `KeyEventKind` defaults to `Release` because dismissal listens on key-up.

use crate::dom::ElementId;

/// Canonical input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Primary activation (click, tap, Enter/Space on a focusable control).
    Activate {
        /// Element the activation was dispatched at.
        target: ElementId,
    },

    /// Pointer entered an element's box.
    PointerEnter {
        /// Element entered.
        target: ElementId,
    },

    /// Pointer left an element's box.
    PointerLeave {
        /// Element left.
        target: ElementId,
    },

    /// Pointer pressed anywhere in the document.
    PointerDown {
        /// Innermost element under the pointer.
        target: ElementId,
    },

    /// A keyboard event.
    Key(KeyEvent),

    /// A section of markup was re-rendered in place (live editor reload).
    SectionLoad {
        /// Root of the replaced subtree.
        scope: ElementId,
    },
}

impl Event {
    /// Element the event was dispatched at.
    #[must_use]
    pub const fn target(&self) -> ElementId {
        match self {
            Self::Activate { target }
            | Self::PointerEnter { target }
            | Self::PointerLeave { target }
            | Self::PointerDown { target } => *target,
            Self::Key(key) => key.target,
            Self::SectionLoad { scope } => *scope,
        }
    }
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code.
    pub code: KeyCode,

    /// Press, repeat, or release.
    pub kind: KeyEventKind,

    /// Element that had focus when the key event fired.
    pub target: ElementId,
}

impl KeyEvent {
    /// Create a key-up event.
    #[must_use]
    pub const fn new(code: KeyCode, target: ElementId) -> Self {
        Self {
            code,
            kind: KeyEventKind::Release,
            target,
        }
    }

    /// Create a key event with a specific kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Escape released.
    #[must_use]
    pub fn is_dismiss(&self) -> bool {
        self.code == KeyCode::Escape && self.kind == KeyEventKind::Release
    }
}

/// Key codes the behaviors care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),

    /// Enter/Return key.
    Enter,

    /// Escape key.
    Escape,

    /// Tab key.
    Tab,

    /// Space bar.
    Space,

    /// Up arrow key.
    Up,

    /// Down arrow key.
    Down,
}

impl KeyCode {
    /// Parse a DOM `KeyboardEvent.key` value.
    #[must_use]
    pub fn from_dom_key(key: &str) -> Option<Self> {
        match key {
            "Escape" | "Esc" => Some(Self::Escape),
            "Enter" => Some(Self::Enter),
            "Tab" => Some(Self::Tab),
            " " | "Spacebar" => Some(Self::Space),
            "ArrowUp" => Some(Self::Up),
            "ArrowDown" => Some(Self::Down),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Self::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

/// The type of key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    /// Key was pressed.
    Press,

    /// Key is being held (repeat event).
    Repeat,

    /// Key was released.
    #[default]
    Release,
}

/// Result of the `(pointer: fine)` media query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerCapability {
    /// Mouse or trackpad: hover is meaningful.
    #[default]
    Fine,
    /// Touch or no pointer: hover is ignored.
    Coarse,
}

impl PointerCapability {
    /// Whether hover-driven behavior should run.
    #[must_use]
    pub const fn supports_hover(self) -> bool {
        matches!(self, Self::Fine)
    }
}
