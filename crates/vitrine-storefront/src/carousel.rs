#![forbid(unsafe_code)]

//! Carousel hydration.
//!
//! Finds carousel roots in markup, reads their `data-*` configuration,
//! and asks the host's [`SliderFactory`] to construct a slider for each one.
//! Hydrated roots are marked `data-swiper-ready="1"` and never touched again.
//!
//! The slider library may load after the markup. While the factory reports
//! [`StorefrontError::SliderUnavailable`], the root is retried on a fixed
//! interval up to a bounded number of attempts.
//!
//! # Invariants
//!
//! 1. A root is handed to the factory successfully at most once.
//! 2. At most one retry is pending per root.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Library never loads | One warning after the last attempt, root left alone |
//! | Factory fails for another reason | Warned, root left unmarked |

use std::time::Duration;

use ahash::AHashMap;
use tracing::{debug, warn};
use vitrine_core::clock::{TimerId, TimerQueue};
use vitrine_core::dom::{Document, ElementId, Mutation, WriteOrigin};
use vitrine_core::selector::Selector;

use crate::error::StorefrontError;

const SWIPER: &str = ".tswiper, .ts2-swiper";
const MARKED: &str = "[data-testimonial-slider]";
const READY_ATTR: &str = "data-swiper-ready";

/// Interval between attempts while the slider library is missing.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(60);
/// Attempts before giving up on a root.
pub const MAX_ATTEMPTS: u32 = 50;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How slides are sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideMode {
    /// Slide widths come from CSS.
    Fixed,
    /// Fractional slides-per-view with breakpoints.
    #[default]
    Fractional,
}

/// Per-root configuration read from `data-*` attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselConfig {
    pub speed: u32,
    pub gap: u32,
    pub autoplay: bool,
    pub autoplay_delay: u32,
    pub mode: SlideMode,
    pub dots: bool,
    pub pagination: String,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            speed: 500,
            gap: 20,
            autoplay: false,
            autoplay_delay: 4000,
            mode: SlideMode::Fractional,
            dots: false,
            pagination: ".swiper-pagination".to_string(),
        }
    }
}

impl CarouselConfig {
    /// Read the configuration of `root`. Unparseable values fall back to
    /// their defaults.
    #[must_use]
    pub fn from_element(doc: &Document, root: ElementId) -> Self {
        let defaults = Self::default();
        let data = |name: &str| doc.attribute(root, name).filter(|v| !v.is_empty());
        Self {
            speed: data("data-speed")
                .and_then(leading_int)
                .unwrap_or(defaults.speed),
            gap: data("data-gap").and_then(leading_int).unwrap_or(defaults.gap),
            autoplay: data("data-autoplay").is_some_and(is_true),
            autoplay_delay: data("data-autoplay-delay")
                .and_then(leading_int)
                .unwrap_or(defaults.autoplay_delay),
            mode: match data("data-mode") {
                Some(m) if m.eq_ignore_ascii_case("fixed") => SlideMode::Fixed,
                _ => SlideMode::Fractional,
            },
            dots: data("data-dots").is_some_and(is_true),
            pagination: data("data-pagination")
                .map_or(defaults.pagination, str::to_string),
        }
    }
}

/// Digits at the start of `raw` (after whitespace and an optional `+`).
fn leading_int(raw: &str) -> Option<u32> {
    let s = raw.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

fn is_true(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

// ---------------------------------------------------------------------------
// Slider parameters
// ---------------------------------------------------------------------------

/// Slides visible at once.
#[derive(Debug, Clone, PartialEq)]
pub enum SlidesPerView {
    Auto,
    Fractional {
        base: f32,
        /// `(min viewport width px, slides per view)`, ascending.
        breakpoints: Vec<(u32, f32)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub prev: ElementId,
    pub next: ElementId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autoplay {
    pub delay: Duration,
    pub disable_on_interaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub element: ElementId,
    pub clickable: bool,
}

/// Everything the host needs to construct a slider.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderParams {
    pub speed: Duration,
    pub space_between: u32,
    pub watch_overflow: bool,
    pub slides_per_view: SlidesPerView,
    pub navigation: Option<Navigation>,
    pub autoplay: Option<Autoplay>,
    pub pagination: Option<Pagination>,
}

impl SliderParams {
    /// Build parameters for a root configured with `config`, resolving
    /// controls inside `scope`.
    #[must_use]
    pub fn build(doc: &Document, scope: ElementId, config: &CarouselConfig) -> Self {
        let find = |sel: &str| {
            Selector::parse(sel)
                .ok()
                .and_then(|sel| doc.query(scope, &sel))
        };
        let navigation = match (find(".ts-prev"), find(".ts-next")) {
            (Some(prev), Some(next)) => Some(Navigation { prev, next }),
            _ => None,
        };
        let pagination = if config.dots {
            find(&config.pagination).map(|element| Pagination {
                element,
                clickable: true,
            })
        } else {
            None
        };
        let slides_per_view = match config.mode {
            SlideMode::Fixed => SlidesPerView::Auto,
            SlideMode::Fractional => SlidesPerView::Fractional {
                base: 1.2,
                breakpoints: vec![(750, 2.1), (990, 3.1)],
            },
        };
        Self {
            speed: Duration::from_millis(u64::from(config.speed)),
            space_between: config.gap,
            watch_overflow: true,
            slides_per_view,
            navigation,
            autoplay: config.autoplay.then(|| Autoplay {
                delay: Duration::from_millis(u64::from(config.autoplay_delay)),
                disable_on_interaction: false,
            }),
            pagination,
        }
    }
}

/// Host slider library.
pub trait SliderFactory {
    /// Construct a slider on `root`.
    ///
    /// Return [`StorefrontError::SliderUnavailable`] while the library has not
    /// loaded; the root is retried later.
    fn create(&mut self, root: ElementId, params: &SliderParams) -> Result<(), StorefrontError>;
}

// ---------------------------------------------------------------------------
// Hydrator
// ---------------------------------------------------------------------------

/// Outcome of one hydration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hydration {
    Hydrated,
    AlreadyReady,
    Retrying,
    Abandoned,
    Failed,
}

/// Discovers and hydrates carousel roots.
#[derive(Debug)]
pub struct CarouselHydrator {
    swiper: Selector,
    roots: Selector,
    retries: TimerQueue<ElementId>,
    /// Slider element -> (attempts so far, pending retry).
    waiting: AHashMap<ElementId, (u32, TimerId)>,
}

impl CarouselHydrator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            swiper: parse_static(SWIPER),
            roots: parse_static(&format!("{MARKED}, {SWIPER}")),
            retries: TimerQueue::new(),
            waiting: AHashMap::new(),
        }
    }

    /// Hydrate every carousel in `scope` (inclusive). Returns how many were
    /// hydrated now.
    pub fn scan(
        &mut self,
        doc: &mut Document,
        scope: ElementId,
        factory: &mut dyn SliderFactory,
        now: Duration,
    ) -> usize {
        let mut candidates = Vec::new();
        if doc.matches(scope, &self.roots) {
            candidates.push(scope);
        }
        candidates.extend(doc.query_all(scope, &self.roots));
        candidates
            .into_iter()
            .filter(|&root| self.hydrate(doc, root, factory, now) == Hydration::Hydrated)
            .count()
    }

    /// Run retries due at `now`.
    pub fn poll(
        &mut self,
        doc: &mut Document,
        factory: &mut dyn SliderFactory,
        now: Duration,
    ) -> usize {
        let mut hydrated = 0;
        while let Some((_, _, slider)) = self.retries.pop_due(now) {
            if !doc.is_connected(slider) {
                self.waiting.remove(&slider);
                continue;
            }
            if self.hydrate(doc, slider, factory, now) == Hydration::Hydrated {
                hydrated += 1;
            }
        }
        hydrated
    }

    /// Scan subtrees added by `mutations`.
    pub fn on_mutations(
        &mut self,
        doc: &mut Document,
        mutations: &[Mutation],
        factory: &mut dyn SliderFactory,
        now: Duration,
    ) -> usize {
        let added: Vec<ElementId> = mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::ChildList { added, .. } => Some(added.iter().copied()),
                Mutation::Attribute { .. } => None,
            })
            .flatten()
            .filter(|&el| doc.is_connected(el))
            .collect();
        added
            .into_iter()
            .map(|el| self.scan(doc, el, factory, now))
            .sum()
    }

    /// Earliest pending retry.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.retries.next_deadline()
    }

    /// Number of roots waiting for the library.
    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    fn hydrate(
        &mut self,
        doc: &mut Document,
        root: ElementId,
        factory: &mut dyn SliderFactory,
        now: Duration,
    ) -> Hydration {
        let slider = if doc.matches(root, &self.swiper) {
            Some(root)
        } else {
            doc.query(root, &self.swiper)
        };
        let Some(slider) = slider else {
            return Hydration::Failed;
        };
        if doc.attribute(slider, READY_ATTR) == Some("1") {
            return Hydration::AlreadyReady;
        }
        let attempts = match self.waiting.get(&slider) {
            Some(&(_, timer)) if self.retries.is_pending(timer) => return Hydration::Retrying,
            Some(&(attempts, _)) => attempts,
            None => 0,
        };

        let config = CarouselConfig::from_element(doc, slider);
        let scope = self.scope_of(doc, slider);
        let params = SliderParams::build(doc, scope, &config);
        match factory.create(slider, &params) {
            Ok(()) => {
                self.waiting.remove(&slider);
                doc.set_attribute_as(slider, READY_ATTR, "1", WriteOrigin::Controller);
                debug!(%slider, mode = ?config.mode, "carousel hydrated");
                Hydration::Hydrated
            }
            Err(StorefrontError::SliderUnavailable) => {
                let attempts = attempts + 1;
                if attempts >= MAX_ATTEMPTS {
                    self.waiting.remove(&slider);
                    warn!(%slider, attempts, "slider library never loaded");
                    return Hydration::Abandoned;
                }
                let timer = self.retries.schedule(now + RETRY_INTERVAL, slider);
                self.waiting.insert(slider, (attempts, timer));
                Hydration::Retrying
            }
            Err(err) => {
                self.waiting.remove(&slider);
                warn!(%slider, error = %err, "carousel hydration failed");
                Hydration::Failed
            }
        }
    }

    fn scope_of(&self, doc: &Document, slider: ElementId) -> ElementId {
        ["[data-testimonial-slider]", ".ts-bleed", "section"]
            .into_iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|sel| doc.closest(slider, &sel))
            .unwrap_or_else(|| doc.root())
    }
}

impl Default for CarouselHydrator {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_static(source: &str) -> Selector {
    Selector::parse(source).unwrap_or_else(|err| unreachable!("built-in selector: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Factory {
        loaded: bool,
        created: Vec<(ElementId, SliderParams)>,
        calls: usize,
    }

    impl SliderFactory for Factory {
        fn create(&mut self, root: ElementId, params: &SliderParams) -> Result<(), StorefrontError> {
            self.calls += 1;
            if !self.loaded {
                return Err(StorefrontError::SliderUnavailable);
            }
            self.created.push((root, params.clone()));
            Ok(())
        }
    }

    fn section_with_slider(doc: &mut Document) -> (ElementId, ElementId) {
        let body = doc.root();
        let section = doc.append_new(body, "section");
        let slider = doc.append_new(section, "div");
        doc.set_attribute(slider, "class", "tswiper");
        (section, slider)
    }

    #[test]
    fn lenient_integer_parsing() {
        assert_eq!(leading_int("750px"), Some(750));
        assert_eq!(leading_int(" +12"), Some(12));
        assert_eq!(leading_int("abc"), None);
        assert_eq!(leading_int("-5"), None);
    }

    #[test]
    fn config_reads_data_attributes_with_defaults() {
        let mut doc = Document::new();
        let (_, slider) = section_with_slider(&mut doc);
        doc.set_attribute(slider, "data-speed", "800ms");
        doc.set_attribute(slider, "data-gap", "oops");
        doc.set_attribute(slider, "data-autoplay", "TRUE");
        doc.set_attribute(slider, "data-mode", "Fixed");
        let cfg = CarouselConfig::from_element(&doc, slider);
        assert_eq!(
            cfg,
            CarouselConfig {
                speed: 800,
                gap: 20,
                autoplay: true,
                mode: SlideMode::Fixed,
                ..CarouselConfig::default()
            }
        );
    }

    #[test]
    fn params_need_both_controls_for_navigation() {
        let mut doc = Document::new();
        let (section, slider) = section_with_slider(&mut doc);
        let prev = doc.append_new(section, "button");
        doc.set_attribute(prev, "class", "ts-prev");
        let cfg = CarouselConfig::from_element(&doc, slider);
        assert_eq!(SliderParams::build(&doc, section, &cfg).navigation, None);

        let next = doc.append_new(section, "button");
        doc.set_attribute(next, "class", "ts-next");
        let params = SliderParams::build(&doc, section, &cfg);
        assert_eq!(params.navigation, Some(Navigation { prev, next }));
        assert!(matches!(params.slides_per_view, SlidesPerView::Fractional { .. }));
    }

    #[test]
    fn pagination_requires_dots_and_element() {
        let mut doc = Document::new();
        let (section, slider) = section_with_slider(&mut doc);
        let dots = doc.append_new(section, "div");
        doc.set_attribute(dots, "class", "swiper-pagination");
        let mut cfg = CarouselConfig::from_element(&doc, slider);
        assert_eq!(SliderParams::build(&doc, section, &cfg).pagination, None);
        cfg.dots = true;
        assert_eq!(
            SliderParams::build(&doc, section, &cfg).pagination,
            Some(Pagination {
                element: dots,
                clickable: true
            })
        );
    }

    #[test]
    fn hydrates_once_and_marks_ready() {
        let mut doc = Document::new();
        let (_, slider) = section_with_slider(&mut doc);
        let mut factory = Factory {
            loaded: true,
            ..Factory::default()
        };
        let mut hydrator = CarouselHydrator::new();
        let body = doc.root();
        assert_eq!(hydrator.scan(&mut doc, body, &mut factory, Duration::ZERO), 1);
        assert_eq!(doc.attribute(slider, READY_ATTR), Some("1"));
        assert_eq!(hydrator.scan(&mut doc, body, &mut factory, Duration::ZERO), 0);
        assert_eq!(factory.created.len(), 1);
    }

    #[test]
    fn retries_until_library_loads() {
        let mut doc = Document::new();
        let (_, slider) = section_with_slider(&mut doc);
        let mut factory = Factory::default();
        let mut hydrator = CarouselHydrator::new();
        let body = doc.root();
        assert_eq!(hydrator.scan(&mut doc, body, &mut factory, Duration::ZERO), 0);
        assert_eq!(hydrator.next_deadline(), Some(RETRY_INTERVAL));

        // A rescan while waiting does not stack another retry.
        hydrator.scan(&mut doc, body, &mut factory, Duration::from_millis(10));
        assert_eq!(hydrator.pending_retries(), 1);

        factory.loaded = true;
        assert_eq!(hydrator.poll(&mut doc, &mut factory, RETRY_INTERVAL), 1);
        assert_eq!(doc.attribute(slider, READY_ATTR), Some("1"));
        assert_eq!(hydrator.pending_retries(), 0);
    }

    #[test]
    #[traced_test]
    fn gives_up_after_bounded_attempts() {
        let mut doc = Document::new();
        section_with_slider(&mut doc);
        let mut factory = Factory::default();
        let mut hydrator = CarouselHydrator::new();
        let body = doc.root();
        hydrator.scan(&mut doc, body, &mut factory, Duration::ZERO);
        let mut now = Duration::ZERO;
        while let Some(deadline) = hydrator.next_deadline() {
            now = deadline;
            hydrator.poll(&mut doc, &mut factory, now);
        }
        assert_eq!(factory.calls, MAX_ATTEMPTS as usize);
        assert_eq!(now, RETRY_INTERVAL * (MAX_ATTEMPTS - 1));
        assert!(logs_contain("slider library never loaded"));
    }

    #[test]
    fn inserted_sections_are_hydrated() {
        let mut doc = Document::new();
        let mut factory = Factory {
            loaded: true,
            ..Factory::default()
        };
        let mut hydrator = CarouselHydrator::new();
        doc.take_mutations();
        let body = doc.root();
        let wrapper = doc.append_new(body, "div");
        doc.set_attribute(wrapper, "data-testimonial-slider", "");
        let slider = doc.append_new(wrapper, "div");
        doc.set_attribute(slider, "class", "ts2-swiper");
        let mutations = doc.take_mutations();
        let n = hydrator.on_mutations(&mut doc, &mutations, &mut factory, Duration::ZERO);
        assert_eq!(n, 1);
        assert_eq!(factory.created[0].0, slider);
    }
}
