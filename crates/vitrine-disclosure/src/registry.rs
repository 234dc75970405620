#![forbid(unsafe_code)]

//! Bound instances, indexed by key, container, and group.
//!
//! The registry replaces "already bound" marker attributes on elements: an
//! element is bound exactly when the registry has an entry for its container.
//!
//! # Invariants
//!
//! 1. At most one instance per container.
//! 2. Every instance is listed in exactly one group, the one it reports.
//! 3. Keys are never reused.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ahash::AHashMap;
use vitrine_core::dom::ElementId;

use crate::controller::DisclosureController;
use crate::coordinator::Disclosure;

/// Stable handle to a bound instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey(u32);

impl InstanceKey {
    /// Wrap a raw key.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw key value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "menu#{}", self.0)
    }
}

/// Sibling group an instance belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum GroupId {
    /// The implicit document-wide group.
    #[default]
    Document,
    /// A group named by the container's group attribute.
    Named(String),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Every bound instance.
#[derive(Debug, Default)]
pub struct Registry {
    instances: BTreeMap<InstanceKey, DisclosureController>,
    by_container: AHashMap<ElementId, InstanceKey>,
    groups: BTreeMap<GroupId, BTreeSet<InstanceKey>>,
    next_key: u32,
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh key.
    pub fn allocate_key(&mut self) -> InstanceKey {
        let key = InstanceKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Register a controller. Returns `false` (and drops nothing) when its
    /// container is already bound.
    pub fn insert(&mut self, controller: DisclosureController) -> bool {
        let container = controller.parts().container;
        if self.by_container.contains_key(&container) {
            return false;
        }
        let key = controller.key();
        self.by_container.insert(container, key);
        self.groups
            .entry(controller.group().clone())
            .or_default()
            .insert(key);
        self.instances.insert(key, controller);
        true
    }

    /// Unregister and return a controller.
    pub fn remove(&mut self, key: InstanceKey) -> Option<DisclosureController> {
        let controller = self.instances.remove(&key)?;
        self.by_container.remove(&controller.parts().container);
        if let Some(members) = self.groups.get_mut(controller.group()) {
            members.remove(&key);
            if members.is_empty() {
                self.groups.remove(controller.group());
            }
        }
        Some(controller)
    }

    /// Look up a controller.
    #[must_use]
    pub fn get(&self, key: InstanceKey) -> Option<&DisclosureController> {
        self.instances.get(&key)
    }

    /// Look up a controller mutably.
    pub fn get_mut(&mut self, key: InstanceKey) -> Option<&mut DisclosureController> {
        self.instances.get_mut(&key)
    }

    /// Instance bound to `container`.
    #[must_use]
    pub fn key_for_container(&self, container: ElementId) -> Option<InstanceKey> {
        self.by_container.get(&container).copied()
    }

    /// All controllers in key order.
    pub fn iter(&self) -> impl Iterator<Item = &DisclosureController> {
        self.instances.values()
    }

    /// All controllers in key order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DisclosureController> {
        self.instances.values_mut()
    }

    /// Snapshot of all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<InstanceKey> {
        self.instances.keys().copied().collect()
    }

    /// Known groups.
    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.keys()
    }

    /// Members of `group` in key order.
    pub fn members(&self, group: &GroupId) -> impl Iterator<Item = InstanceKey> + '_ {
        self.groups.get(group).into_iter().flatten().copied()
    }

    /// Every member of `group` except `except`, mutably.
    pub fn siblings_mut(
        &mut self,
        group: &GroupId,
        except: InstanceKey,
    ) -> impl Iterator<Item = &mut DisclosureController> {
        let members = self.groups.get(group).cloned().unwrap_or_default();
        self.instances
            .iter_mut()
            .filter(move |(key, _)| **key != except && members.contains(key))
            .map(|(_, controller)| controller)
    }

    /// Members of `group` currently logically expanded.
    #[must_use]
    pub fn expanded_in(&self, group: &GroupId) -> usize {
        self.members(group)
            .filter_map(|key| self.instances.get(&key))
            .filter(|c| c.is_expanded())
            .count()
    }

    /// Number of bound instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
