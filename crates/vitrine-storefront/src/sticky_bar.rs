#![forbid(unsafe_code)]

//! Sticky add-to-cart bar.
//!
//! The bar appears once the shopper scrolls past a trigger element. Binding
//! inserts a 1px sentinel right after the trigger; the host observes the
//! sentinel's intersection with the viewport and reports "scrolled past" via
//! [`StickyBar::update`]. Activations inside the bar resolve to a
//! [`BarAction`] the host carries out.
//!
//! # Invariants
//!
//! 1. `hidden` and `is-visible` on the bar are always opposite.
//! 2. An unchanged signal writes nothing.

use tracing::debug;
use vitrine_core::dom::{Document, ElementId, WriteOrigin};
use vitrine_core::selector::Selector;

use crate::error::StorefrontError;

const BUTTON_CLASS: &str = "p-stickybar__btn";
const LINKS_CLASS: &str = "p-stickybar__links";
const VISIBLE_CLASS: &str = "is-visible";
const PRODUCT_FORM: &str = r#"form[action$="/cart/add"][id^="product-form-"]"#;

/// Where and how to mount one sticky bar.
#[derive(Debug, Clone, PartialEq)]
pub struct StickyBarConfig {
    /// Id of the bar element.
    pub bar_id: String,
    /// Id of the default trigger (the product info block).
    pub default_trigger_id: String,
    /// Optional selector overriding the trigger.
    pub trigger_selector: Option<String>,
    /// Extra distance below the trigger, in pixels.
    pub offset_px: i32,
    /// Id given to the inserted sentinel.
    pub sentinel_id: String,
    /// Scroll targets tried for "details" links, in order.
    pub details_fallbacks: Vec<String>,
    /// Scroll targets tried for "reviews" links, in order.
    pub reviews_fallbacks: Vec<String>,
}

impl StickyBarConfig {
    /// Standard ids and fallbacks for the product section `section_id`.
    #[must_use]
    pub fn for_section(section_id: &str) -> Self {
        Self {
            bar_id: format!("p-stickybar-{section_id}"),
            default_trigger_id: format!("ProductInfo-{section_id}"),
            trigger_selector: None,
            offset_px: 0,
            sentinel_id: format!("p-stickybar-sentinel-{section_id}"),
            details_fallbacks: vec![
                format!("#pta-panel-details-{section_id}"),
                format!("#pta-acc-content-details-{section_id}"),
                ".product__description".to_string(),
            ],
            reviews_fallbacks: vec![
                "#Reviews".to_string(),
                "#shopify-product-reviews".to_string(),
                "#judgeme_product_reviews".to_string(),
                "#looxReviews".to_string(),
            ],
        }
    }
}

/// What the host should do after an activation inside the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarAction {
    /// Submit this product form (see [`crate::ProductForm::request_submit`]).
    SubmitForm(ElementId),
    /// Prevent the default and smooth-scroll this element into view.
    ScrollTo(ElementId),
    /// Nothing to do.
    Ignore,
}

/// Scroll link group, chosen from the link text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkGroup {
    /// Product details.
    Details,
    /// Product reviews.
    Reviews,
}

/// A bound sticky bar.
#[derive(Debug, Clone)]
pub struct StickyBar {
    config: StickyBarConfig,
    bar: ElementId,
    trigger: ElementId,
    sentinel: ElementId,
    visible: Option<bool>,
}

impl StickyBar {
    /// Locate the bar and its trigger and insert the sentinel if missing.
    pub fn bind(doc: &mut Document, config: StickyBarConfig) -> Result<Self, StorefrontError> {
        let bar = doc
            .element_by_id(&config.bar_id)
            .ok_or_else(|| StorefrontError::missing("sticky bar", format!("#{}", config.bar_id)))?;
        let default_trigger = doc.element_by_id(&config.default_trigger_id).ok_or_else(|| {
            StorefrontError::missing("product info", format!("#{}", config.default_trigger_id))
        })?;

        let trigger = config
            .trigger_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| Selector::parse(s).ok())
            .and_then(|sel| doc.query(doc.root(), &sel))
            .unwrap_or(default_trigger);

        let sentinel = match doc.element_by_id(&config.sentinel_id) {
            Some(existing) => existing,
            None => {
                let sentinel = doc.create_element("div");
                doc.set_attribute_as(sentinel, "id", &config.sentinel_id, WriteOrigin::Controller);
                doc.set_attribute_as(sentinel, "aria-hidden", "true", WriteOrigin::Controller);
                let style = format!("height:1px;width:1px;margin-top:{}px;", config.offset_px);
                doc.set_attribute_as(sentinel, "style", &style, WriteOrigin::Controller);
                if !doc.insert_after(trigger, sentinel) {
                    return Err(StorefrontError::missing("trigger parent", trigger.to_string()));
                }
                sentinel
            }
        };
        debug!(%bar, %trigger, %sentinel, "sticky bar bound");

        Ok(Self {
            config,
            bar,
            trigger,
            sentinel,
            visible: None,
        })
    }

    /// The bar element.
    #[must_use]
    pub const fn bar(&self) -> ElementId {
        self.bar
    }

    /// The element whose bottom edge arms the bar.
    #[must_use]
    pub const fn trigger(&self) -> ElementId {
        self.trigger
    }

    /// The element the host observes.
    #[must_use]
    pub const fn sentinel(&self) -> ElementId {
        self.sentinel
    }

    /// Whether the bar is currently shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(false)
    }

    /// Apply the "sentinel is above the viewport" signal. Returns whether
    /// anything was written.
    pub fn update(&mut self, doc: &mut Document, past: bool) -> bool {
        if self.visible == Some(past) {
            return false;
        }
        self.visible = Some(past);
        doc.toggle_attribute_as(self.bar, "hidden", !past, WriteOrigin::Controller);
        doc.toggle_class_as(self.bar, VISIBLE_CLASS, past, WriteOrigin::Controller);
        true
    }

    /// Resolve an activation at `target`.
    #[must_use]
    pub fn on_activate(&self, doc: &Document, target: ElementId) -> BarAction {
        if !doc.contains(self.bar, target) {
            return BarAction::Ignore;
        }
        if self.ancestor_with_class(doc, target, BUTTON_CLASS).is_some() {
            return Selector::parse(PRODUCT_FORM)
                .ok()
                .and_then(|sel| doc.query(doc.root(), &sel))
                .map_or(BarAction::Ignore, BarAction::SubmitForm);
        }
        let Some(link) = self.ancestor_with_tag(doc, target, "a") else {
            return BarAction::Ignore;
        };
        if self.ancestor_with_class(doc, link, LINKS_CLASS).is_none() {
            return BarAction::Ignore;
        }
        let group = if doc.text_content(link).to_lowercase().contains("review") {
            LinkGroup::Reviews
        } else {
            LinkGroup::Details
        };
        let raw = doc.attribute(link, "data-target").unwrap_or_default();
        self.resolve_target(doc, raw, group)
            .map_or(BarAction::Ignore, BarAction::ScrollTo)
    }

    /// `raw` when it matches something, else the first matching fallback for
    /// `group`.
    #[must_use]
    pub fn resolve_target(&self, doc: &Document, raw: &str, group: LinkGroup) -> Option<ElementId> {
        let fallbacks = match group {
            LinkGroup::Details => &self.config.details_fallbacks,
            LinkGroup::Reviews => &self.config.reviews_fallbacks,
        };
        std::iter::once(raw)
            .chain(fallbacks.iter().map(String::as_str))
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|sel| doc.query(doc.root(), &sel))
    }

    fn ancestor_with_class(&self, doc: &Document, from: ElementId, class: &str) -> Option<ElementId> {
        self.ancestors_in_bar(doc, from)
            .find(|&el| doc.has_class(el, class))
    }

    fn ancestor_with_tag(&self, doc: &Document, from: ElementId, tag: &str) -> Option<ElementId> {
        self.ancestors_in_bar(doc, from).find(|&el| doc.tag(el) == tag)
    }

    fn ancestors_in_bar<'a>(
        &self,
        doc: &'a Document,
        from: ElementId,
    ) -> impl Iterator<Item = ElementId> + 'a {
        let bar = self.bar;
        std::iter::successors(Some(from), move |&el| {
            if el == bar { None } else { doc.parent(el) }
        })
    }
}
