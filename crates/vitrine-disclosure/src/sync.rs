#![forbid(unsafe_code)]

//! Keeps structural and interactivity attributes consistent with logical
//! state.
//!
//! All writes are tagged [`WriteOrigin::Controller`]. Only
//! [`WriteOrigin::External`] changes to the structural attribute reach
//! [`AttributeSynchronizer::reconcile_external`], so the synchronizer never
//! reacts to its own writes.
//!
//! # Invariants
//!
//! 1. A settled closed panel is `hidden`, non-interactive, and shows the closed
//!    frame; the container lacks the structural attribute.
//! 2. An opening or open panel is visible and interactive and the container
//!    carries the structural attribute.
//! 3. Panel opacity and offset are never written here except for the initial
//!    frame at bind time; the driver owns them afterwards.

use vitrine_core::animation::Frame;
use vitrine_core::dom::{Document, ElementId, PointerEvents, WriteOrigin};

const HIDDEN: &str = "hidden";

/// The elements one disclosure instance is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parts {
    /// Element carrying the structural attribute.
    pub container: ElementId,
    /// Element the user activates.
    pub trigger: ElementId,
    /// Element that is shown and animated.
    pub panel: ElementId,
}

/// What the runtime should do after an external structural write was
/// reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reissue {
    /// Run a normal open request.
    Open,
    /// Run a normal close request.
    Close,
}

/// Attribute writer for one instance.
#[derive(Debug, Clone)]
pub struct AttributeSynchronizer {
    structural: String,
}

impl AttributeSynchronizer {
    /// Synchronizer writing `structural` as the expanded marker.
    #[must_use]
    pub fn new(structural: impl Into<String>) -> Self {
        Self {
            structural: structural.into(),
        }
    }

    /// Structural attribute name.
    #[must_use]
    pub fn structural_attribute(&self) -> &str {
        &self.structural
    }

    /// Whether the container currently carries the structural attribute.
    #[must_use]
    pub fn is_marked_expanded(&self, parts: &Parts, doc: &Document) -> bool {
        doc.has_attribute(parts.container, &self.structural)
    }

    /// Make a freshly bound instance consistent with `expanded`.
    pub fn apply_initial(&self, parts: &Parts, expanded: bool, closed: Frame, doc: &mut Document) {
        if expanded {
            self.apply_opening(parts, doc);
            doc.set_visual(parts.panel, Frame::SHOWN.opacity, Frame::SHOWN.offset_y);
        } else {
            self.apply_closed(parts, doc);
            doc.set_visual(parts.panel, closed.opacity, closed.offset_y);
        }
    }

    /// Panel renderable and interactive; structural attribute set.
    pub fn apply_opening(&self, parts: &Parts, doc: &mut Document) {
        doc.remove_attribute_as(parts.panel, HIDDEN, WriteOrigin::Controller);
        doc.set_pointer_events(parts.panel, PointerEvents::Auto);
        doc.toggle_attribute_as(parts.container, &self.structural, true, WriteOrigin::Controller);
    }

    /// Drop the structural attribute only; the panel stays rendered so a
    /// closing transition can still play on it.
    pub fn clear_structural(&self, parts: &Parts, doc: &mut Document) {
        doc.remove_attribute_as(parts.container, &self.structural, WriteOrigin::Controller);
    }

    /// Structural attribute removed; panel hidden and non-interactive.
    pub fn apply_closed(&self, parts: &Parts, doc: &mut Document) {
        self.clear_structural(parts, doc);
        doc.set_pointer_events(parts.panel, PointerEvents::None);
        doc.toggle_attribute_as(parts.panel, HIDDEN, true, WriteOrigin::Controller);
    }

    /// Compare the observed structural attribute with logical state.
    ///
    /// On disagreement the external write is reverted immediately and the
    /// request it expressed is returned so the runtime can replay it through
    /// the normal path (siblings, transition, settle).
    pub fn reconcile_external(
        &self,
        parts: &Parts,
        logically_expanded: bool,
        doc: &mut Document,
    ) -> Option<Reissue> {
        let observed = self.is_marked_expanded(parts, doc);
        if observed == logically_expanded {
            return None;
        }
        doc.toggle_attribute_as(
            parts.container,
            &self.structural,
            logically_expanded,
            WriteOrigin::Controller,
        );
        Some(if observed {
            Reissue::Open
        } else {
            Reissue::Close
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::dom::Mutation;

    fn fixture() -> (Document, Parts) {
        let mut doc = Document::new();
        let container = doc.append_new(doc.root(), "details");
        let trigger = doc.append_new(container, "summary");
        let panel = doc.append_new(container, "div");
        doc.take_mutations();
        (
            doc,
            Parts {
                container,
                trigger,
                panel,
            },
        )
    }

    #[test]
    fn closed_then_opening_attributes() {
        let (mut doc, parts) = fixture();
        let sync = AttributeSynchronizer::new("open");
        sync.apply_initial(&parts, false, Frame::hidden(-16.0), &mut doc);
        assert!(doc.has_attribute(parts.panel, "hidden"));
        assert_eq!(doc.style(parts.panel).pointer_events, PointerEvents::None);
        assert_eq!(doc.style(parts.panel).opacity, 0.0);

        sync.apply_opening(&parts, &mut doc);
        assert!(!doc.has_attribute(parts.panel, "hidden"));
        assert!(doc.has_attribute(parts.container, "open"));
        assert_eq!(doc.style(parts.panel).pointer_events, PointerEvents::Auto);
        assert!(
            doc.take_mutations()
                .iter()
                .all(|m| m.origin() == WriteOrigin::Controller)
        );
    }

    #[test]
    fn clear_structural_keeps_panel_rendered() {
        let (mut doc, parts) = fixture();
        let sync = AttributeSynchronizer::new("open");
        sync.apply_opening(&parts, &mut doc);
        sync.clear_structural(&parts, &mut doc);
        assert!(!doc.has_attribute(parts.container, "open"));
        assert!(!doc.has_attribute(parts.panel, "hidden"));
    }

    #[test]
    fn reconcile_reverts_and_reissues() {
        let (mut doc, parts) = fixture();
        let sync = AttributeSynchronizer::new("open");
        sync.apply_initial(&parts, false, Frame::hidden(-16.0), &mut doc);
        doc.take_mutations();

        doc.set_attribute(parts.container, "open", "");
        assert_eq!(
            sync.reconcile_external(&parts, false, &mut doc),
            Some(Reissue::Open)
        );
        assert!(!doc.has_attribute(parts.container, "open"));
        let records = doc.take_mutations();
        assert!(matches!(
            records.last(),
            Some(Mutation::Attribute { new: None, origin: WriteOrigin::Controller, .. })
        ));

        assert_eq!(sync.reconcile_external(&parts, false, &mut doc), None);
    }

    #[test]
    fn external_close_of_expanded_instance_reissues_close() {
        let (mut doc, parts) = fixture();
        let sync = AttributeSynchronizer::new("open");
        sync.apply_initial(&parts, true, Frame::hidden(-16.0), &mut doc);
        doc.remove_attribute(parts.container, "open");
        assert_eq!(
            sync.reconcile_external(&parts, true, &mut doc),
            Some(Reissue::Close)
        );
        assert!(doc.has_attribute(parts.container, "open"));
    }
}
