#![forbid(unsafe_code)]

//! Translates input events into disclosure commands.
//!
//! Routing is a pure function of the event, the registry, and the document;
//! the runtime executes the returned [`Command`]s. The router's only state is
//! the pending hover-leave timer per instance.
//!
//! | Event | Condition | Command |
//! |-------|-----------|---------|
//! | `Activate` | target inside a bound trigger | `Toggle` (default prevented) |
//! | `PointerEnter` | fine pointer, target is a bound container | `HoverEnter` |
//! | `PointerLeave` | fine pointer, target is a bound container | `HoverLeave` |
//! | `PointerDown` | target outside an expanded instance | `Close` per instance |
//! | `Key` | Escape released inside an expanded instance | `Dismiss` |
//! | `SectionLoad` | always | `Rescan` |

use std::time::Duration;

use ahash::AHashMap;
use tracing::trace;
use vitrine_core::clock::{TimerId, TimerQueue};
use vitrine_core::dom::{Document, ElementId};
use vitrine_core::event::{Event, PointerCapability};

use crate::registry::{InstanceKey, Registry};
use crate::turn::TimerEvent;

/// Work derived from one input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open if collapsed, close otherwise.
    Toggle(InstanceKey),
    /// Pointer entered: cancel a pending hover close, then open.
    HoverEnter(InstanceKey),
    /// Pointer left: arm the hover close timer.
    HoverLeave(InstanceKey),
    /// Non-forced close.
    Close(InstanceKey),
    /// Close and return focus to the trigger.
    Dismiss(InstanceKey),
    /// Bind new containers under this scope.
    Rescan(ElementId),
}

/// Result of routing one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routed {
    /// Commands in execution order.
    pub commands: Vec<Command>,
    /// The host should suppress the event's default action.
    pub default_prevented: bool,
}

/// Input router.
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    hover_close_delay: Duration,
    pending_hover: AHashMap<InstanceKey, TimerId>,
}

impl EventRouter {
    /// Router with the given hover-leave grace period.
    #[must_use]
    pub fn new(hover_close_delay: Duration) -> Self {
        Self {
            hover_close_delay,
            pending_hover: AHashMap::new(),
        }
    }

    /// Map `event` to commands.
    #[must_use]
    pub fn route(
        &self,
        event: &Event,
        registry: &Registry,
        doc: &Document,
        pointer: PointerCapability,
    ) -> Routed {
        let mut routed = Routed::default();
        match event {
            Event::Activate { target } => {
                if let Some(key) = innermost_instance(registry, doc, *target)
                    && registry
                        .get(key)
                        .is_some_and(|c| doc.contains(c.parts().trigger, *target))
                {
                    routed.commands.push(Command::Toggle(key));
                    routed.default_prevented = true;
                }
            }
            Event::PointerEnter { target } if pointer.supports_hover() => {
                if let Some(key) = registry.key_for_container(*target) {
                    routed.commands.push(Command::HoverEnter(key));
                }
            }
            Event::PointerLeave { target } if pointer.supports_hover() => {
                if let Some(key) = registry.key_for_container(*target) {
                    routed.commands.push(Command::HoverLeave(key));
                }
            }
            Event::PointerEnter { .. } | Event::PointerLeave { .. } => {}
            Event::PointerDown { target } => {
                routed.commands.extend(
                    registry
                        .iter()
                        .filter(|c| {
                            c.state().is_expanded() && !doc.contains(c.parts().container, *target)
                        })
                        .map(|c| Command::Close(c.key())),
                );
            }
            Event::Key(key_event) => {
                if key_event.is_dismiss()
                    && let Some(key) = innermost_instance(registry, doc, key_event.target)
                    && registry.get(key).is_some_and(|c| c.state().is_expanded())
                {
                    routed.commands.push(Command::Dismiss(key));
                }
            }
            Event::SectionLoad { scope } => routed.commands.push(Command::Rescan(*scope)),
        }
        if !routed.commands.is_empty() {
            trace!(?event, commands = ?routed.commands, "routed");
        }
        routed
    }

    /// Start (or restart) the hover close grace timer for `key`.
    ///
    /// Returns `false` when the delay is zero and the caller should close
    /// immediately.
    pub fn arm_hover_close(
        &mut self,
        key: InstanceKey,
        timers: &mut TimerQueue<TimerEvent>,
        now: Duration,
    ) -> bool {
        self.cancel_hover_close(key, timers);
        if self.hover_close_delay.is_zero() {
            return false;
        }
        let id = timers.schedule(
            now + self.hover_close_delay,
            TimerEvent::HoverClose { instance: key },
        );
        self.pending_hover.insert(key, id);
        true
    }

    /// Drop a pending hover close for `key`.
    pub fn cancel_hover_close(&mut self, key: InstanceKey, timers: &mut TimerQueue<TimerEvent>) {
        if let Some(id) = self.pending_hover.remove(&key) {
            timers.cancel(id);
        }
    }

    /// A hover close timer fired. Returns whether it is still the pending one.
    pub fn hover_close_fired(&mut self, key: InstanceKey, id: TimerId) -> bool {
        if self.pending_hover.get(&key) == Some(&id) {
            self.pending_hover.remove(&key);
            true
        } else {
            false
        }
    }

    /// Whether a hover close is pending for `key`.
    #[must_use]
    pub fn hover_close_pending(&self, key: InstanceKey) -> bool {
        self.pending_hover.contains_key(&key)
    }
}

/// The bound instance whose container most closely encloses `target`.
fn innermost_instance(
    registry: &Registry,
    doc: &Document,
    target: ElementId,
) -> Option<InstanceKey> {
    let mut cursor = Some(target);
    while let Some(element) = cursor {
        if let Some(key) = registry.key_for_container(element) {
            return Some(key);
        }
        cursor = doc.parent(element);
    }
    None
}
