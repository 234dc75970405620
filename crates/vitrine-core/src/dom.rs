#![forbid(unsafe_code)]

//! Arena-backed document model mirrored from storefront markup.
//!
//! The host builds (or mirrors) markup into a [`Document`]; behaviors read and
//! write attributes, inline style, text, and focus through it. Every attribute
//! write that actually changes a value, and every structural change, is queued
//! as a [`Mutation`] so the runtime can observe writes it did not make.
//!
//! # Invariants
//!
//! 1. `ElementId`s are never reused; removed elements stay in the arena,
//!    detached, so stale ids resolve to a disconnected element rather than a
//!    different one.
//! 2. A write that leaves the value unchanged produces no mutation record.
//! 3. Each record carries the [`WriteOrigin`] of the write that produced it.
//!    Host-facing setters use [`WriteOrigin::External`].
//! 4. Style writes (opacity, offset, pointer-events) are not recorded; they
//!    are presentational and never reconciled.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::{self, Write as _};

use crate::selector::{Matchable, Selector};

/// Stable handle to an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u32);

impl ElementId {
    /// Raw arena index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Who performed an attribute write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOrigin {
    /// A behavior controller wrote it on its own write path.
    Controller,
    /// Anything else: other scripts, native default actions, the host.
    External,
}

/// `pointer-events` equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerEvents {
    /// Element receives pointer input.
    #[default]
    Auto,
    /// Element is transparent to pointer input.
    None,
}

/// Inline presentational style the behaviors animate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    /// Opacity in `[0.0, 1.0]`.
    pub opacity: f32,
    /// Vertical translation in CSS pixels.
    pub offset_y: f32,
    /// Pointer interactivity.
    pub pointer_events: PointerEvents,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            offset_y: 0.0,
            pointer_events: PointerEvents::Auto,
        }
    }
}

/// A recorded document change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// An attribute was set, changed, or removed.
    Attribute {
        /// Element whose attribute changed.
        element: ElementId,
        /// Attribute name.
        name: String,
        /// Previous value (`None` = absent).
        old: Option<String>,
        /// New value (`None` = removed).
        new: Option<String>,
        /// Who wrote it.
        origin: WriteOrigin,
    },
    /// Children were inserted into or removed from `parent`.
    ChildList {
        /// The parent whose child list changed.
        parent: ElementId,
        /// Inserted subtree roots.
        added: Vec<ElementId>,
        /// Removed subtree roots.
        removed: Vec<ElementId>,
    },
}

impl Mutation {
    /// Origin of an attribute mutation; child-list changes are always external.
    #[must_use]
    pub fn origin(&self) -> WriteOrigin {
        match self {
            Self::Attribute { origin, .. } => *origin,
            Self::ChildList { .. } => WriteOrigin::External,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: Style,
    text: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Matchable for Node {
    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// The document: element arena, focus, and mutation queue.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: ElementId,
    focused: Option<ElementId>,
    pending: VecDeque<Mutation>,
    history: Option<Vec<Mutation>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Construction and tree structure
// ---------------------------------------------------------------------------

impl Document {
    /// Create a document with an empty `body` root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
                style: Style::default(),
                text: String::new(),
                parent: None,
                children: Vec::new(),
            }],
            root: ElementId(0),
            focused: None,
            pending: VecDeque::new(),
            history: None,
        }
    }

    /// The root element.
    #[must_use]
    pub const fn root(&self) -> ElementId {
        self.root
    }

    /// Keep a copy of every mutation record for later inspection.
    pub fn enable_history(&mut self) {
        if self.history.is_none() {
            self.history = Some(Vec::new());
        }
    }

    /// Every mutation recorded since [`enable_history`](Self::enable_history).
    #[must_use]
    pub fn history(&self) -> &[Mutation] {
        self.history.as_deref().unwrap_or(&[])
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> ElementId {
        let id = ElementId(self.nodes.len() as u32);
        self.nodes.push(Node {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            style: Style::default(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create an element and append it to `parent`.
    pub fn append_new(&mut self, parent: ElementId, tag: &str) -> ElementId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    /// Append `child` (detaching it from any previous parent).
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.detach(child);
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
        self.record(Mutation::ChildList {
            parent,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    /// Insert `new` as the next sibling of `reference`.
    ///
    /// Returns `false` when `reference` has no parent.
    pub fn insert_after(&mut self, reference: ElementId, new: ElementId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        self.detach(new);
        let siblings = &mut self.nodes[parent.0 as usize].children;
        let pos = siblings
            .iter()
            .position(|&c| c == reference)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(pos, new);
        self.nodes[new.0 as usize].parent = Some(parent);
        self.record(Mutation::ChildList {
            parent,
            added: vec![new],
            removed: Vec::new(),
        });
        true
    }

    /// Detach `element` (and its subtree) from the tree.
    pub fn remove(&mut self, element: ElementId) {
        let Some(parent) = self.parent(element) else {
            return;
        };
        self.detach(element);
        if self
            .focused
            .is_some_and(|f| self.contains(element, f))
        {
            self.focused = None;
        }
        self.record(Mutation::ChildList {
            parent,
            added: Vec::new(),
            removed: vec![element],
        });
    }

    /// Remove every child of `parent`.
    pub fn clear_children(&mut self, parent: ElementId) {
        let children = std::mem::take(&mut self.nodes[parent.0 as usize].children);
        if children.is_empty() {
            return;
        }
        for &child in &children {
            self.nodes[child.0 as usize].parent = None;
        }
        if self
            .focused
            .is_some_and(|f| children.iter().any(|&c| self.contains(c, f)))
        {
            self.focused = None;
        }
        self.record(Mutation::ChildList {
            parent,
            added: Vec::new(),
            removed: children,
        });
    }

    fn detach(&mut self, element: ElementId) {
        if let Some(parent) = self.nodes[element.0 as usize].parent.take() {
            self.nodes[parent.0 as usize]
                .children
                .retain(|&c| c != element);
        }
    }

    /// Parent element, if attached.
    #[must_use]
    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.nodes.get(element.0 as usize).and_then(|n| n.parent)
    }

    /// Direct children in document order.
    #[must_use]
    pub fn children(&self, element: ElementId) -> &[ElementId] {
        self.nodes
            .get(element.0 as usize)
            .map_or(&[], |n| n.children.as_slice())
    }

    /// Whether `element` is reachable from the root.
    #[must_use]
    pub fn is_connected(&self, element: ElementId) -> bool {
        self.contains(self.root, element)
    }

    /// Inclusive containment: `node` is `ancestor` or one of its descendants.
    #[must_use]
    pub fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Descendants of `scope` in document order (excluding `scope`).
    #[must_use]
    pub fn descendants(&self, scope: ElementId) -> Descendants<'_> {
        let mut stack: Vec<ElementId> = self.children(scope).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }
}

/// Pre-order iterator over a subtree.
#[derive(Debug)]
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<ElementId>,
}

impl Iterator for Descendants<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(next).iter().rev().copied());
        Some(next)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Document {
    /// Whether `element` matches `selector`.
    #[must_use]
    pub fn matches(&self, element: ElementId, selector: &Selector) -> bool {
        self.nodes
            .get(element.0 as usize)
            .is_some_and(|n| selector.matches(n))
    }

    /// All descendants of `scope` matching `selector`, in document order.
    #[must_use]
    pub fn query_all(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId> {
        self.descendants(scope)
            .filter(|&el| self.matches(el, selector))
            .collect()
    }

    /// First descendant of `scope` matching `selector`.
    #[must_use]
    pub fn query(&self, scope: ElementId, selector: &Selector) -> Option<ElementId> {
        self.descendants(scope).find(|&el| self.matches(el, selector))
    }

    /// Nearest inclusive ancestor matching `selector`.
    #[must_use]
    pub fn closest(&self, element: ElementId, selector: &Selector) -> Option<ElementId> {
        let mut cursor = Some(element);
        while let Some(current) = cursor {
            if self.matches(current, selector) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Connected element whose `id` attribute equals `id`.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<ElementId> {
        self.descendants(self.root)
            .find(|&el| self.attribute(el, "id") == Some(id))
    }

    /// Lowercase tag name.
    #[must_use]
    pub fn tag(&self, element: ElementId) -> &str {
        self.nodes
            .get(element.0 as usize)
            .map_or("", |n| n.tag.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attributes, classes, text
// ---------------------------------------------------------------------------

impl Document {
    /// Attribute value, if present.
    #[must_use]
    pub fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
        self.nodes
            .get(element.0 as usize)
            .and_then(|n| n.attrs.get(name))
            .map(String::as_str)
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn has_attribute(&self, element: ElementId, name: &str) -> bool {
        self.attribute(element, name).is_some()
    }

    /// Set an attribute as an external writer.
    pub fn set_attribute(&mut self, element: ElementId, name: &str, value: &str) -> bool {
        self.set_attribute_as(element, name, value, WriteOrigin::External)
    }

    /// Remove an attribute as an external writer.
    pub fn remove_attribute(&mut self, element: ElementId, name: &str) -> bool {
        self.remove_attribute_as(element, name, WriteOrigin::External)
    }

    /// Set an attribute, tagging the write with `origin`.
    ///
    /// Returns `true` if the value changed.
    pub fn set_attribute_as(
        &mut self,
        element: ElementId,
        name: &str,
        value: &str,
        origin: WriteOrigin,
    ) -> bool {
        let node = &mut self.nodes[element.0 as usize];
        let old = node.attrs.insert(name.to_string(), value.to_string());
        if old.as_deref() == Some(value) {
            return false;
        }
        self.record(Mutation::Attribute {
            element,
            name: name.to_string(),
            old,
            new: Some(value.to_string()),
            origin,
        });
        true
    }

    /// Remove an attribute, tagging the write with `origin`.
    ///
    /// Returns `true` if it was present.
    pub fn remove_attribute_as(
        &mut self,
        element: ElementId,
        name: &str,
        origin: WriteOrigin,
    ) -> bool {
        let Some(old) = self.nodes[element.0 as usize].attrs.remove(name) else {
            return false;
        };
        self.record(Mutation::Attribute {
            element,
            name: name.to_string(),
            old: Some(old),
            new: None,
            origin,
        });
        true
    }

    /// Present-or-absent boolean attribute write.
    pub fn toggle_attribute_as(
        &mut self,
        element: ElementId,
        name: &str,
        present: bool,
        origin: WriteOrigin,
    ) -> bool {
        if present {
            if self.has_attribute(element, name) {
                return false;
            }
            self.set_attribute_as(element, name, "", origin)
        } else {
            self.remove_attribute_as(element, name, origin)
        }
    }

    /// Whether the `class` attribute lists `class`.
    #[must_use]
    pub fn has_class(&self, element: ElementId, class: &str) -> bool {
        self.attribute(element, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// Add or remove a class, tagging the write with `origin`.
    pub fn toggle_class_as(
        &mut self,
        element: ElementId,
        class: &str,
        present: bool,
        origin: WriteOrigin,
    ) -> bool {
        if self.has_class(element, class) == present {
            return false;
        }
        let current = self.attribute(element, "class").unwrap_or("");
        let mut classes: Vec<&str> = current
            .split_ascii_whitespace()
            .filter(|&c| c != class)
            .collect();
        if present {
            classes.push(class);
        }
        let joined = classes.join(" ");
        self.set_attribute_as(element, "class", &joined, origin)
    }

    /// Text content owned directly by `element`.
    #[must_use]
    pub fn text(&self, element: ElementId) -> &str {
        self.nodes
            .get(element.0 as usize)
            .map_or("", |n| n.text.as_str())
    }

    /// Concatenated text of `element` and its descendants.
    #[must_use]
    pub fn text_content(&self, element: ElementId) -> String {
        let mut out = self.text(element).to_string();
        for el in self.descendants(element) {
            out.push_str(self.text(el));
        }
        out
    }

    /// Replace the text owned directly by `element`.
    pub fn set_text(&mut self, element: ElementId, text: &str) {
        self.nodes[element.0 as usize].text = text.to_string();
    }
}

// ---------------------------------------------------------------------------
// Style and focus
// ---------------------------------------------------------------------------

impl Document {
    /// Inline style of `element`.
    #[must_use]
    pub fn style(&self, element: ElementId) -> Style {
        self.nodes
            .get(element.0 as usize)
            .map_or_else(Style::default, |n| n.style)
    }

    /// Write opacity and vertical offset.
    pub fn set_visual(&mut self, element: ElementId, opacity: f32, offset_y: f32) {
        let style = &mut self.nodes[element.0 as usize].style;
        style.opacity = opacity;
        style.offset_y = offset_y;
    }

    /// Write pointer interactivity.
    pub fn set_pointer_events(&mut self, element: ElementId, pointer_events: PointerEvents) {
        self.nodes[element.0 as usize].style.pointer_events = pointer_events;
    }

    /// Move focus to `element`.
    pub fn focus(&mut self, element: ElementId) {
        self.focused = Some(element);
    }

    /// Currently focused element.
    #[must_use]
    pub const fn focused(&self) -> Option<ElementId> {
        self.focused
    }
}

// ---------------------------------------------------------------------------
// Mutation queue and serialization
// ---------------------------------------------------------------------------

impl Document {
    fn record(&mut self, mutation: Mutation) {
        if let Some(history) = &mut self.history {
            history.push(mutation.clone());
        }
        self.pending.push_back(mutation);
    }

    /// Whether mutation records are waiting to be drained.
    #[must_use]
    pub fn has_pending_mutations(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain queued mutation records in the order they happened.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        self.pending.drain(..).collect()
    }

    /// Serialize a subtree as HTML (attributes and text escaped).
    #[must_use]
    pub fn outer_html(&self, element: ElementId) -> String {
        let mut out = String::new();
        self.write_html(element, &mut out);
        out
    }

    fn write_html(&self, element: ElementId, out: &mut String) {
        let Some(node) = self.nodes.get(element.0 as usize) else {
            return;
        };
        let _ = write!(out, "<{}", node.tag);
        for (name, value) in &node.attrs {
            if value.is_empty() {
                let _ = write!(out, " {name}");
            } else {
                let _ = write!(out, " {name}=\"{}\"", v_htmlescape::escape(value));
            }
        }
        out.push('>');
        let _ = write!(out, "{}", v_htmlescape::escape(&node.text));
        for &child in &node.children {
            self.write_html(child, out);
        }
        let _ = write!(out, "</{}>", node.tag);
    }
}
