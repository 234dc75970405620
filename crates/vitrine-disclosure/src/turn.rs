#![forbid(unsafe_code)]

//! The mutable context of one turn.
//!
//! Every state change happens inside a turn: an input event, a platform
//! completion, or a due timer. A [`Turn`] bundles the document, the platform
//! and the timer queue so controllers can be driven without owning any of
//! them.

use std::time::Duration;

use vitrine_core::animation::AnimationPlatform;
use vitrine_core::clock::TimerQueue;
use vitrine_core::dom::{Document, ElementId};

use crate::registry::InstanceKey;

/// Deferred work scheduled on the runtime's timer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Force-settle a transition whose completion never arrived.
    Fallback {
        /// Instance running the transition.
        instance: InstanceKey,
        /// Generation of the handle that armed this timer.
        generation: u64,
    },
    /// Hover grace period elapsed.
    HoverClose {
        /// Instance the pointer left.
        instance: InstanceKey,
    },
    /// Stop watching an incomplete container.
    BindDeadline {
        /// The container that never became bindable.
        container: ElementId,
    },
}

/// Mutable context handed to controllers for one turn.
pub struct Turn<'a> {
    /// The document.
    pub doc: &'a mut Document,
    /// The platform animation capability.
    pub platform: &'a mut dyn AnimationPlatform,
    /// Deadline timers.
    pub timers: &'a mut TimerQueue<TimerEvent>,
    /// Current monotonic time.
    pub now: Duration,
}

impl std::fmt::Debug for Turn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turn")
            .field("now", &self.now)
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}
