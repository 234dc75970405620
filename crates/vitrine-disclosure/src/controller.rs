#![forbid(unsafe_code)]

//! One bound disclosure instance.
//!
//! The controller owns the logical state, the transition driver, and the
//! attribute synchronizer for its instance. It knows nothing about siblings:
//! the runtime runs the [`SiblingCoordinator`](crate::SiblingCoordinator)
//! before calling [`Disclosure::open`].
//!
//! # Invariants
//!
//! 1. `state` is `Opening`/`Closing` exactly when the driver holds a handle,
//!    except on platforms without animation where transitions settle
//!    immediately.
//! 2. The structural attribute is present in `Opening` and `Open`, and in
//!    `Closing` unless the close was forced.

use tracing::debug;
use vitrine_core::animation::PlatformAnimationId;
use vitrine_core::dom::Document;

use crate::config::ResolvedConfig;
use crate::coordinator::Disclosure;
use crate::driver::{AnimationDriver, AnimationHandle, Started};
use crate::registry::{GroupId, InstanceKey};
use crate::state::{Direction, LogicalState};
use crate::sync::{AttributeSynchronizer, Parts, Reissue};
use crate::turn::Turn;

/// A bound disclosure instance.
#[derive(Debug, Clone)]
pub struct DisclosureController {
    key: InstanceKey,
    id: String,
    group: GroupId,
    parts: Parts,
    state: LogicalState,
    driver: AnimationDriver,
    sync: AttributeSynchronizer,
    transitions: u64,
}

impl DisclosureController {
    /// Bind an instance and make the document agree with `expanded`.
    pub fn bind(
        key: InstanceKey,
        id: String,
        group: GroupId,
        parts: Parts,
        expanded: bool,
        config: &ResolvedConfig,
        doc: &mut Document,
    ) -> Self {
        let sync = AttributeSynchronizer::new(config.structural_attribute.clone());
        sync.apply_initial(&parts, expanded, config.closed_frame, doc);
        Self {
            key,
            id,
            group,
            parts,
            state: if expanded {
                LogicalState::Open
            } else {
                LogicalState::Closed
            },
            driver: AnimationDriver::new(key, config.timing, config.slack, config.closed_frame),
            sync,
            transitions: 0,
        }
    }

    /// Registry key.
    #[must_use]
    pub const fn key(&self) -> InstanceKey {
        self.key
    }

    /// Container `id`, or `#<index>` when it has none.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sibling group.
    #[must_use]
    pub const fn group(&self) -> &GroupId {
        &self.group
    }

    /// Container, trigger, and panel.
    #[must_use]
    pub const fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Logical state.
    #[must_use]
    pub const fn state(&self) -> LogicalState {
        self.state
    }

    /// Running transition.
    #[must_use]
    pub const fn handle(&self) -> Option<&AnimationHandle> {
        self.driver.current()
    }

    /// Transitions started since binding.
    #[must_use]
    pub const fn transitions_started(&self) -> u64 {
        self.transitions
    }

    fn begin(&mut self, direction: Direction, turn: &mut Turn<'_>) {
        self.state = direction.in_flight();
        self.transitions += 1;
        debug!(instance = %self.key, id = %self.id, group = %self.group, %direction, "transition");
        if self.driver.start(direction, self.parts.panel, turn) == Started::Immediate {
            self.settle(direction, turn);
        }
    }

    fn settle(&mut self, direction: Direction, turn: &mut Turn<'_>) {
        debug_assert_eq!(self.state, direction.in_flight());
        self.state = direction.settled();
        if direction == Direction::Closing {
            self.sync.apply_closed(&self.parts, turn.doc);
        }
        debug!(instance = %self.key, state = %self.state, "settled");
    }

    /// Platform completion for `id`. Returns whether it settled this instance.
    pub fn on_completion(&mut self, id: PlatformAnimationId, turn: &mut Turn<'_>) -> bool {
        match self.driver.complete(id, self.parts.panel, turn) {
            Some(direction) => {
                self.settle(direction, turn);
                true
            }
            None => false,
        }
    }

    /// Fallback timer for `generation`. Returns whether it settled this
    /// instance.
    pub fn on_fallback(&mut self, generation: u64, turn: &mut Turn<'_>) -> bool {
        match self.driver.force_settle(generation, self.parts.panel, turn) {
            Some(direction) => {
                self.settle(direction, turn);
                true
            }
            None => false,
        }
    }

    /// Reconcile an external structural write against logical state.
    pub fn reconcile(&mut self, doc: &mut Document) -> Option<Reissue> {
        let reissue = self
            .sync
            .reconcile_external(&self.parts, self.state.is_expanded(), doc);
        if let Some(request) = reissue {
            debug!(instance = %self.key, state = %self.state, ?request, "external structural write reverted");
        }
        reissue
    }

    /// Copy the current animation frame onto the panel.
    pub fn sample(&self, turn: &mut Turn<'_>) {
        self.driver.sample(self.parts.panel, turn);
    }

    /// Stop any transition before the instance is unbound, leaving the
    /// elements in the state the transition was heading to.
    pub fn teardown(&mut self, turn: &mut Turn<'_>) {
        if let Some(handle) = self.driver.cancel(turn) {
            let end = self.driver.keyframes(handle.direction()).to;
            turn.doc.set_visual(self.parts.panel, end.opacity, end.offset_y);
            self.settle(handle.direction(), turn);
        }
    }
}

impl Disclosure for DisclosureController {
    fn open(&mut self, turn: &mut Turn<'_>) {
        if self.state.is_expanded() {
            return;
        }
        self.sync.apply_opening(&self.parts, turn.doc);
        self.begin(Direction::Opening, turn);
    }

    fn close(&mut self, turn: &mut Turn<'_>, force: bool) {
        match (self.state, force) {
            (LogicalState::Opening | LogicalState::Open, _) => {
                if force {
                    self.sync.clear_structural(&self.parts, turn.doc);
                }
                self.begin(Direction::Closing, turn);
            }
            (LogicalState::Closing, true) => {
                // Already heading to the closed frame; only the structural
                // attribute has to go now.
                self.sync.clear_structural(&self.parts, turn.doc);
            }
            (LogicalState::Closed, true) => {
                self.driver.cancel(turn);
                self.sync.apply_closed(&self.parts, turn.doc);
            }
            (LogicalState::Closing | LogicalState::Closed, false) => {}
        }
    }

    fn is_expanded(&self) -> bool {
        self.state.is_expanded()
    }
}
