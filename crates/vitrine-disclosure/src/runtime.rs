#![forbid(unsafe_code)]

//! The mega-menu runtime.
//!
//! [`MegaMenus`] owns the document, the animation platform, a deterministic
//! clock, the timer queue, and every bound [`DisclosureController`]. The host
//! drives it with three calls:
//!
//! - [`MegaMenus::dispatch`] for input events,
//! - [`MegaMenus::advance`] / [`MegaMenus::advance_to`] for time,
//! - [`MegaMenus::flush`] after writing to the document directly.
//!
//! Each platform completion and each due timer runs as its own turn, in
//! deadline order. At the end of every turn queued mutation records are
//! drained: external writes to a container's structural attribute are
//! reconciled, and child-list changes retry pending bindings.
//!
//! # Invariants
//!
//! 1. Within a group, at most one instance is logically expanded and at most
//!    one container carries the structural attribute after every public call.
//! 2. Every transition settles within `duration + slack` of its start, even
//!    when the platform never reports completion.
//! 3. The registry changes only in bind, unbind, and rescan.
//!
//! # Failure Modes
//!
//! - Incomplete markup: warned once, watched for late children until the
//!   retry window closes, then abandoned with a second warning.
//! - No animation capability: warned once at construction; every transition
//!   settles in the turn that started it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};
use vitrine_core::animation::{AnimationPlatform, PlatformAnimationId, SimulatedPlatform};
use vitrine_core::clock::{Clock, DeterministicClock, TimerId, TimerQueue};
use vitrine_core::dom::{Document, ElementId, Mutation, WriteOrigin};
use vitrine_core::event::{Event, PointerCapability};

use crate::config::{DisclosureConfig, ResolvedConfig};
use crate::controller::DisclosureController;
use crate::coordinator::{Disclosure, SiblingCoordinator};
use crate::error::{BindError, ConfigError};
use crate::registry::{GroupId, InstanceKey, Registry};
use crate::router::{Command, EventRouter};
use crate::state::LogicalState;
use crate::sync::{Parts, Reissue};
use crate::turn::{TimerEvent, Turn};

/// Reconciliation passes per turn before giving up on quiescence.
const MAX_SETTLE_PASSES: usize = 8;

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Newly bound instances, in document order.
    pub bound: Vec<InstanceKey>,
    /// Containers that were already bound.
    pub already_bound: usize,
    /// Containers missing a part.
    pub incomplete: Vec<BindError>,
}

/// Outcome of [`MegaMenus::dispatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// The host should call `preventDefault` on the original event.
    pub default_prevented: bool,
    /// Instances the event was routed to.
    pub affected: Vec<InstanceKey>,
}

#[derive(Debug, Clone, Copy)]
struct PendingBind {
    index: usize,
    deadline: TimerId,
}

/// Every mega-menu disclosure in one document.
pub struct MegaMenus<P: AnimationPlatform = SimulatedPlatform> {
    config: ResolvedConfig,
    doc: Document,
    platform: P,
    clock: DeterministicClock,
    timers: TimerQueue<TimerEvent>,
    registry: Registry,
    router: EventRouter,
    pointer: PointerCapability,
    pending: BTreeMap<ElementId, PendingBind>,
    abandoned: BTreeSet<ElementId>,
}

impl<P: AnimationPlatform> fmt::Debug for MegaMenus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MegaMenus")
            .field("now", &self.clock.now())
            .field("instances", &self.registry.len())
            .field("timers", &self.timers.len())
            .field("pending", &self.pending.len())
            .field("pointer", &self.pointer)
            .finish_non_exhaustive()
    }
}

impl<P: AnimationPlatform> MegaMenus<P> {
    /// Validate `config` and build a runtime. Nothing is bound until
    /// [`rescan`](Self::rescan).
    pub fn new(config: &DisclosureConfig, doc: Document, platform: P) -> Result<Self, ConfigError> {
        Ok(Self::with_resolved(config.resolve()?, doc, platform))
    }

    /// Build a runtime from an already resolved configuration.
    pub fn with_resolved(config: ResolvedConfig, doc: Document, platform: P) -> Self {
        if !platform.supports_animation() {
            warn!("animation capability missing; disclosures will open and close without transitions");
        }
        Self {
            router: EventRouter::new(config.hover_close_delay),
            config,
            doc,
            platform,
            clock: DeterministicClock::new(),
            timers: TimerQueue::new(),
            registry: Registry::new(),
            pointer: PointerCapability::default(),
            pending: BTreeMap::new(),
            abandoned: BTreeSet::new(),
        }
    }

    // -- accessors ---------------------------------------------------------

    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.doc
    }

    /// The document, for external writes. Call [`flush`](Self::flush)
    /// afterwards to reconcile them.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// The animation platform.
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// The animation platform, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Current monotonic time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Set the primary pointer's capability (hover is ignored on coarse
    /// pointers).
    pub fn set_pointer_capability(&mut self, pointer: PointerCapability) {
        self.pointer = pointer;
    }

    /// Bound instances.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A bound instance.
    #[must_use]
    pub fn controller(&self, key: InstanceKey) -> Option<&DisclosureController> {
        self.registry.get(key)
    }

    /// Logical state of a bound instance.
    #[must_use]
    pub fn state(&self, key: InstanceKey) -> Option<LogicalState> {
        self.registry.get(key).map(DisclosureController::state)
    }

    /// Instance bound to `container`.
    #[must_use]
    pub fn key_for(&self, container: ElementId) -> Option<InstanceKey> {
        self.registry.key_for_container(container)
    }

    /// Instance whose container has `id`.
    #[must_use]
    pub fn key_for_id(&self, id: &str) -> Option<InstanceKey> {
        self.registry
            .iter()
            .find(|c| c.id() == id)
            .map(DisclosureController::key)
    }

    /// Logically expanded members of `group`.
    #[must_use]
    pub fn expanded_in(&self, group: &GroupId) -> usize {
        self.registry.expanded_in(group)
    }

    /// Containers still waiting for missing parts.
    #[must_use]
    pub fn pending_binds(&self) -> usize {
        self.pending.len()
    }

    /// Whether the runtime gave up on binding `container`.
    #[must_use]
    pub fn is_abandoned(&self, container: ElementId) -> bool {
        self.abandoned.contains(&container)
    }

    /// Pending deadline timers (fallback, hover, bind).
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    // -- binding -----------------------------------------------------------

    /// Drop instances whose containers left the document, then bind every
    /// unbound container under `scope` (inclusive). Idempotent.
    pub fn rescan(&mut self, scope: ElementId) -> BindReport {
        self.prune_detached();
        let report = self.scan(scope);
        self.settle_mutations();
        report
    }

    /// Unbind an instance, cancelling its transition and timers.
    pub fn unbind(&mut self, key: InstanceKey) -> bool {
        let Some(mut controller) = self.registry.remove(key) else {
            return false;
        };
        self.router.cancel_hover_close(key, &mut self.timers);
        let mut turn = Turn {
            doc: &mut self.doc,
            platform: &mut self.platform,
            timers: &mut self.timers,
            now: self.clock.now(),
        };
        controller.teardown(&mut turn);
        info!(instance = %key, id = controller.id(), "unbound");
        true
    }

    fn scan(&mut self, scope: ElementId) -> BindReport {
        let mut report = BindReport::default();
        let mut containers = Vec::new();
        if self.doc.matches(scope, &self.config.container) {
            containers.push(scope);
        }
        containers.extend(self.doc.query_all(scope, &self.config.container));

        for (index, container) in containers.into_iter().enumerate() {
            if self.registry.key_for_container(container).is_some() {
                report.already_bound += 1;
                continue;
            }
            if self.abandoned.contains(&container) {
                continue;
            }
            match self.try_bind(container, index) {
                Ok(key) => {
                    if let Some(pending) = self.pending.remove(&container) {
                        self.timers.cancel(pending.deadline);
                    }
                    report.bound.push(key);
                }
                Err(err) => {
                    if !self.pending.contains_key(&container) {
                        warn!(%container, error = %err, "disclosure markup incomplete; watching for late children");
                        let deadline = self.timers.schedule(
                            self.clock.now() + self.config.bind_retry_window,
                            TimerEvent::BindDeadline { container },
                        );
                        self.pending
                            .insert(container, PendingBind { index, deadline });
                    }
                    report.incomplete.push(err);
                }
            }
        }
        if !report.bound.is_empty() {
            info!(%scope, bound = report.bound.len(), total = self.registry.len(), "disclosures bound");
        }
        report
    }

    fn try_bind(&mut self, container: ElementId, index: usize) -> Result<InstanceKey, BindError> {
        let trigger = self
            .doc
            .query(container, &self.config.trigger)
            .ok_or_else(|| BindError::MissingTrigger {
                container,
                selector: self.config.trigger.as_str().to_string(),
            })?;
        let panel = self
            .doc
            .query(container, &self.config.panel)
            .ok_or_else(|| BindError::MissingPanel {
                container,
                selector: self.config.panel.as_str().to_string(),
            })?;

        let id = self
            .doc
            .attribute(container, "id")
            .filter(|id| !id.is_empty())
            .map_or_else(|| format!("#{index}"), str::to_string);
        let group = self
            .doc
            .attribute(container, &self.config.group_attribute)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or(GroupId::Document, |name| GroupId::Named(name.to_string()));

        let marked = self
            .doc
            .has_attribute(container, &self.config.structural_attribute);
        let expanded = marked && self.registry.expanded_in(&group) == 0;
        if marked && !expanded {
            debug!(%container, %group, "group already has an expanded member; binding collapsed");
        }

        let key = self.registry.allocate_key();
        let parts = Parts {
            container,
            trigger,
            panel,
        };
        let controller =
            DisclosureController::bind(key, id, group, parts, expanded, &self.config, &mut self.doc);
        debug!(instance = %key, id = controller.id(), group = %controller.group(), expanded, "bound");
        self.registry.insert(controller);
        Ok(key)
    }

    fn prune_detached(&mut self) {
        let detached: Vec<InstanceKey> = self
            .registry
            .iter()
            .filter(|c| !self.doc.is_connected(c.parts().container))
            .map(DisclosureController::key)
            .collect();
        for key in detached {
            self.unbind(key);
        }

        let gone: Vec<ElementId> = self
            .pending
            .keys()
            .filter(|container| !self.doc.is_connected(**container))
            .copied()
            .collect();
        for container in gone {
            if let Some(pending) = self.pending.remove(&container) {
                self.timers.cancel(pending.deadline);
            }
        }
    }

    fn retry_pending(&mut self, grown: &[ElementId]) {
        let ready: Vec<(ElementId, usize)> = self
            .pending
            .iter()
            .filter(|(container, _)| {
                self.doc.is_connected(**container)
                    && grown.iter().any(|&parent| self.doc.contains(**container, parent))
            })
            .map(|(container, pending)| (*container, pending.index))
            .collect();
        for (container, index) in ready {
            if let Ok(key) = self.try_bind(container, index) {
                if let Some(pending) = self.pending.remove(&container) {
                    self.timers.cancel(pending.deadline);
                }
                info!(instance = %key, %container, "late children arrived; bound");
            }
        }
    }

    // -- requests ----------------------------------------------------------

    /// Open an instance (siblings in its group close first).
    ///
    /// Returns `false` when `key` is not bound.
    pub fn open(&mut self, key: InstanceKey) -> bool {
        if self.registry.get(key).is_none() {
            return false;
        }
        self.request_open(key);
        self.settle_mutations();
        true
    }

    /// Close an instance. `force` runs even when it is already collapsed.
    ///
    /// Returns `false` when `key` is not bound.
    pub fn close(&mut self, key: InstanceKey, force: bool) -> bool {
        if self.registry.get(key).is_none() {
            return false;
        }
        self.request_close(key, force);
        self.settle_mutations();
        true
    }

    /// Open when collapsed, close otherwise.
    pub fn toggle(&mut self, key: InstanceKey) -> bool {
        match self.state(key) {
            Some(state) if state.is_expanded() => self.close(key, false),
            Some(_) => self.open(key),
            None => false,
        }
    }

    fn with_turn<R>(
        &mut self,
        f: impl FnOnce(&mut Registry, &mut EventRouter, &mut Turn<'_>) -> R,
    ) -> R {
        let mut turn = Turn {
            doc: &mut self.doc,
            platform: &mut self.platform,
            timers: &mut self.timers,
            now: self.clock.now(),
        };
        f(&mut self.registry, &mut self.router, &mut turn)
    }

    fn request_open(&mut self, key: InstanceKey) {
        let Some(group) = self
            .registry
            .get(key)
            .filter(|c| !c.state().is_expanded())
            .map(|c| c.group().clone())
        else {
            return;
        };
        self.with_turn(|registry, _, turn| {
            let collapsed = SiblingCoordinator::close_others(registry.siblings_mut(&group, key), turn);
            if collapsed > 0 {
                debug!(instance = %key, %group, collapsed, "siblings force-closed");
            }
            if let Some(controller) = registry.get_mut(key) {
                controller.open(turn);
            }
        });
    }

    fn request_close(&mut self, key: InstanceKey, force: bool) {
        self.with_turn(|registry, router, turn| {
            router.cancel_hover_close(key, turn.timers);
            if let Some(controller) = registry.get_mut(key) {
                controller.close(turn, force);
            }
        });
    }

    // -- input -------------------------------------------------------------

    /// Route and execute one input event.
    pub fn dispatch(&mut self, event: &Event) -> Dispatch {
        self.settle_mutations();
        let routed = self
            .router
            .route(event, &self.registry, &self.doc, self.pointer);
        let mut affected = Vec::new();
        for command in &routed.commands {
            if let Some(key) = self.execute(command)
                && !affected.contains(&key)
            {
                affected.push(key);
            }
        }
        self.settle_mutations();
        Dispatch {
            default_prevented: routed.default_prevented,
            affected,
        }
    }

    fn execute(&mut self, command: &Command) -> Option<InstanceKey> {
        match *command {
            Command::Toggle(key) => {
                if self.state(key).is_some_and(LogicalState::is_expanded) {
                    self.request_close(key, false);
                } else {
                    self.request_open(key);
                }
                Some(key)
            }
            Command::HoverEnter(key) => {
                self.router.cancel_hover_close(key, &mut self.timers);
                self.request_open(key);
                Some(key)
            }
            Command::HoverLeave(key) => {
                let now = self.clock.now();
                if !self.router.arm_hover_close(key, &mut self.timers, now) {
                    self.request_close(key, false);
                }
                Some(key)
            }
            Command::Close(key) => {
                self.request_close(key, false);
                Some(key)
            }
            Command::Dismiss(key) => {
                self.request_close(key, false);
                if let Some(trigger) = self.registry.get(key).map(|c| c.parts().trigger) {
                    self.doc.focus(trigger);
                }
                Some(key)
            }
            Command::Rescan(scope) => {
                self.rescan(scope);
                None
            }
        }
    }

    // -- time --------------------------------------------------------------

    /// Advance time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        let target = self.clock.now().saturating_add(dt);
        self.advance_to(target);
    }

    /// Advance time to `target`, running every completion and timer due on
    /// the way in deadline order, then sampling animation frames at `target`.
    pub fn advance_to(&mut self, target: Duration) {
        self.settle_mutations();
        loop {
            let next = [self.timers.next_deadline(), self.platform.next_notification()]
                .into_iter()
                .flatten()
                .min();
            let Some(at) = next.filter(|&at| at <= target) else {
                break;
            };
            self.clock.set(at);
            let now = self.clock.now();

            let mut progressed = false;
            for id in self.platform.take_notifications(now) {
                progressed = true;
                self.on_completion(id);
                self.settle_mutations();
            }
            while let Some((id, _, event)) = self.timers.pop_due(now) {
                progressed = true;
                self.on_timer(id, event);
                self.settle_mutations();
            }
            if !progressed {
                break;
            }
        }
        self.clock.set(target);
        self.with_turn(|registry, _, turn| {
            for controller in registry.iter() {
                controller.sample(turn);
            }
        });
    }

    fn on_completion(&mut self, id: PlatformAnimationId) {
        let owner = self
            .registry
            .iter()
            .find(|c| c.handle().is_some_and(|h| h.platform_id() == id))
            .map(DisclosureController::key);
        let Some(key) = owner else {
            debug!(animation = id.get(), "stale completion ignored");
            return;
        };
        self.with_turn(|registry, _, turn| {
            if let Some(controller) = registry.get_mut(key) {
                controller.on_completion(id, turn);
            }
        });
    }

    fn on_timer(&mut self, id: TimerId, event: TimerEvent) {
        match event {
            TimerEvent::Fallback {
                instance,
                generation,
            } => {
                self.with_turn(|registry, _, turn| {
                    if let Some(controller) = registry.get_mut(instance) {
                        controller.on_fallback(generation, turn);
                    }
                });
            }
            TimerEvent::HoverClose { instance } => {
                if self.router.hover_close_fired(instance, id) {
                    self.request_close(instance, false);
                }
            }
            TimerEvent::BindDeadline { container } => {
                if self
                    .pending
                    .get(&container)
                    .is_some_and(|pending| pending.deadline == id)
                {
                    self.pending.remove(&container);
                    self.abandoned.insert(container);
                    warn!(%container, "disclosure markup still incomplete; giving up");
                }
            }
        }
    }

    // -- reconciliation ----------------------------------------------------

    /// Reconcile external document writes made since the last turn.
    pub fn flush(&mut self) {
        self.settle_mutations();
    }

    fn settle_mutations(&mut self) {
        for _ in 0..MAX_SETTLE_PASSES {
            let mutations = self.doc.take_mutations();
            if mutations.is_empty() {
                return;
            }
            let mut flipped: Vec<InstanceKey> = Vec::new();
            let mut grown: Vec<ElementId> = Vec::new();
            for mutation in &mutations {
                match mutation {
                    Mutation::Attribute {
                        element,
                        name,
                        origin: WriteOrigin::External,
                        ..
                    } if *name == self.config.structural_attribute => {
                        if let Some(key) = self.registry.key_for_container(*element)
                            && !flipped.contains(&key)
                        {
                            flipped.push(key);
                        }
                    }
                    Mutation::ChildList { parent, added, .. } if !added.is_empty() => {
                        grown.push(*parent);
                    }
                    _ => {}
                }
            }
            for key in flipped {
                self.reconcile(key);
            }
            if !grown.is_empty() && !self.pending.is_empty() {
                self.retry_pending(&grown);
            }
        }
        if self.doc.has_pending_mutations() {
            warn!("document writes did not quiesce; leaving records for the next turn");
        }
    }

    fn reconcile(&mut self, key: InstanceKey) {
        let Some(controller) = self.registry.get_mut(key) else {
            return;
        };
        match controller.reconcile(&mut self.doc) {
            Some(Reissue::Open) => self.request_open(key),
            Some(Reissue::Close) => self.request_close(key, false),
            None => {}
        }
    }
}
