#![forbid(unsafe_code)]

//! Drives a [`Scenario`] through [`MegaMenus`] and records a trace.

use std::time::Duration;

use tracing::{debug, info, warn};
use vitrine_core::animation::{AnimationPlatform, SimulatedPlatform, UnsupportedPlatform};
use vitrine_core::clock::{Clock, WallClock};
use vitrine_core::dom::PointerEvents;
use vitrine_core::event::{Event, KeyCode, KeyEvent};
use vitrine_disclosure::MegaMenus;

use crate::error::{ReplayError, Result};
use crate::scenario::{Markup, MenuMarkup, Scenario, Step};
use crate::trace::{MenuSnapshot, TraceRecord};

/// Platform knobs a scenario can turn.
pub trait ReplayPlatform: AnimationPlatform {
    /// Withhold completion notifications. Returns `false` when the platform
    /// has no notifications to withhold.
    fn withhold(&mut self, enabled: bool) -> bool;
}

impl ReplayPlatform for SimulatedPlatform {
    fn withhold(&mut self, enabled: bool) -> bool {
        self.set_withhold_notifications(enabled);
        true
    }
}

impl ReplayPlatform for UnsupportedPlatform {
    fn withhold(&mut self, _enabled: bool) -> bool {
        false
    }
}

/// Run `scenario` to completion.
///
/// Step 0 of the trace is the state right after the initial scan.
pub fn run(scenario: &Scenario) -> Result<Vec<TraceRecord>> {
    let wall = WallClock::new();
    let records = if scenario.platform.animation {
        let mut platform = SimulatedPlatform::new();
        if scenario.platform.stale_notifications {
            platform = platform.with_stale_notifications();
        }
        platform.set_withhold_notifications(scenario.platform.withhold_notifications);
        Replayer::new(scenario, platform)?.run()?
    } else {
        Replayer::new(scenario, UnsupportedPlatform)?.run()?
    };
    info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        elapsed_us = wall.now().as_micros() as u64,
        "scenario replayed"
    );
    Ok(records)
}

struct Replayer<'s, P: ReplayPlatform> {
    scenario: &'s Scenario,
    runtime: MegaMenus<P>,
    markup: Markup,
}

impl<'s, P: ReplayPlatform> Replayer<'s, P> {
    fn new(scenario: &'s Scenario, platform: P) -> Result<Self> {
        let (doc, markup) = scenario.build_document();
        let mut runtime = MegaMenus::new(&scenario.config, doc, platform)?;
        runtime.set_pointer_capability(scenario.pointer.into());
        Ok(Self {
            scenario,
            runtime,
            markup,
        })
    }

    fn run(mut self) -> Result<Vec<TraceRecord>> {
        let root = self.runtime.document().root();
        let report = self.runtime.rescan(root);
        debug!(
            bound = report.bound.len(),
            incomplete = report.incomplete.len(),
            "initial scan"
        );
        let mut records = vec![self.record(0, "scan", None)];
        for (index, step) in self.scenario.steps.iter().enumerate() {
            let number = index + 1;
            let prevented = self.apply(number, step)?;
            records.push(self.record(number, step.action(), prevented));
        }
        Ok(records)
    }

    fn apply(&mut self, step: usize, action: &Step) -> Result<Option<bool>> {
        let dispatched = |this: &mut Self, event: Event| {
            Some(this.runtime.dispatch(&event).default_prevented)
        };
        Ok(match action {
            Step::Activate { menu } => {
                let target = self.menu(step, menu)?.trigger;
                dispatched(self, Event::Activate { target })
            }
            Step::ActivateLink { menu } => {
                let target = self
                    .menu(step, menu)?
                    .link
                    .ok_or_else(|| ReplayError::invalid_step(step, format!("`{menu}` has no panel")))?;
                dispatched(self, Event::Activate { target })
            }
            Step::HoverEnter { menu } => {
                let target = self.menu(step, menu)?.container;
                dispatched(self, Event::PointerEnter { target })
            }
            Step::HoverLeave { menu } => {
                let target = self.menu(step, menu)?.container;
                dispatched(self, Event::PointerLeave { target })
            }
            Step::Escape { menu } => {
                let target = self.menu(step, menu)?.trigger;
                self.runtime.document_mut().focus(target);
                dispatched(self, Event::Key(KeyEvent::new(KeyCode::Escape, target)))
            }
            Step::Key { menu, key } => {
                let code = KeyCode::from_dom_key(key).ok_or_else(|| {
                    ReplayError::invalid_step(step, format!("unknown key `{key}`"))
                })?;
                let target = self.menu(step, menu)?.trigger;
                self.runtime.document_mut().focus(target);
                dispatched(self, Event::Key(KeyEvent::new(code, target)))
            }
            Step::PointerDown { menu } => {
                let target = match menu {
                    Some(menu) => self.menu(step, menu)?.trigger,
                    None => self.markup.outside,
                };
                dispatched(self, Event::PointerDown { target })
            }
            Step::Reload { menu } => {
                let scope = match menu {
                    Some(menu) => self.menu(step, menu)?.container,
                    None => self.markup.nav,
                };
                dispatched(self, Event::SectionLoad { scope })
            }
            Step::Open { menu } => {
                let key = self.key(step, menu)?;
                self.runtime.open(key);
                None
            }
            Step::Close { menu, force } => {
                let key = self.key(step, menu)?;
                self.runtime.close(key, *force);
                None
            }
            Step::SetOpen { menu } => {
                let container = self.menu(step, menu)?.container;
                let attr = self.runtime.config().structural_attribute.clone();
                self.runtime.document_mut().set_attribute(container, &attr, "");
                self.runtime.flush();
                None
            }
            Step::ClearOpen { menu } => {
                let container = self.menu(step, menu)?.container;
                let attr = self.runtime.config().structural_attribute.clone();
                self.runtime.document_mut().remove_attribute(container, &attr);
                self.runtime.flush();
                None
            }
            Step::AddPanel { menu } => {
                let mut handles = self.menu(step, menu)?;
                if handles.panel.is_some() {
                    return Err(ReplayError::invalid_step(
                        step,
                        format!("`{menu}` already has a panel"),
                    ));
                }
                handles.attach_panel(self.runtime.document_mut());
                self.markup.menus.insert(menu.clone(), handles);
                self.runtime.flush();
                None
            }
            Step::Pointer { capability } => {
                self.runtime.set_pointer_capability((*capability).into());
                None
            }
            Step::Withhold { enabled } => {
                if !self.runtime.platform_mut().withhold(*enabled) {
                    warn!(step, "platform has no notifications to withhold");
                }
                None
            }
            Step::Advance { ms } => {
                self.runtime.advance(Duration::from_millis(*ms));
                None
            }
            Step::Expect { menu, state } => {
                let actual = self.state_of(self.menu(step, menu)?);
                if !actual.eq_ignore_ascii_case(state) {
                    return Err(ReplayError::Expectation {
                        step,
                        menu: menu.clone(),
                        expected: state.clone(),
                        actual: actual.to_string(),
                    });
                }
                None
            }
        })
    }

    fn menu(&self, step: usize, menu: &str) -> Result<MenuMarkup> {
        self.markup
            .menus
            .get(menu)
            .copied()
            .ok_or_else(|| ReplayError::UnknownMenu {
                step,
                menu: menu.to_string(),
            })
    }

    fn key(&self, step: usize, menu: &str) -> Result<vitrine_disclosure::InstanceKey> {
        let container = self.menu(step, menu)?.container;
        self.runtime
            .key_for(container)
            .ok_or_else(|| ReplayError::invalid_step(step, format!("`{menu}` is not bound")))
    }

    fn state_of(&self, menu: MenuMarkup) -> &'static str {
        self.runtime
            .key_for(menu.container)
            .and_then(|key| self.runtime.state(key))
            .map_or("unbound", |state| state.as_str())
    }

    fn record(&self, step: usize, action: &str, default_prevented: Option<bool>) -> TraceRecord {
        let doc = self.runtime.document();
        let structural = &self.runtime.config().structural_attribute;
        let menus = self
            .scenario
            .menus
            .iter()
            .filter_map(|spec| {
                let handles = self.markup.menus.get(&spec.id)?;
                let (hidden, style) = handles.panel.map_or((true, None), |panel| {
                    (doc.has_attribute(panel, "hidden"), Some(doc.style(panel)))
                });
                let style = style.unwrap_or_default();
                Some(MenuSnapshot {
                    id: spec.id.clone(),
                    state: self.state_of(*handles).to_string(),
                    open: doc.has_attribute(handles.container, structural),
                    hidden,
                    opacity: style.opacity,
                    offset_y: style.offset_y,
                    interactive: style.pointer_events == PointerEvents::Auto && !hidden,
                })
            })
            .collect();
        TraceRecord {
            step,
            at_ms: self.runtime.now().as_millis() as u64,
            action: action.to_string(),
            default_prevented,
            menus,
        }
    }
}
