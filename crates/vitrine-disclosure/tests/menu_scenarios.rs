//! End-to-end behavior of the mega-menu runtime.

use std::time::Duration;

use pretty_assertions::assert_eq;
use vitrine_core::animation::{SimulatedPlatform, UnsupportedPlatform};
use vitrine_core::dom::{Document, ElementId, Mutation, PointerEvents, WriteOrigin};
use vitrine_core::event::{Event, KeyCode, KeyEvent, KeyEventKind, PointerCapability};
use vitrine_disclosure::{
    BindError, DisclosureConfig, GroupId, InstanceKey, LogicalState, MegaMenus,
};

const DURATION: Duration = Duration::from_millis(350);
const SLACK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
struct Menu {
    container: ElementId,
    summary: ElementId,
    panel: ElementId,
}

fn add_menu(doc: &mut Document, parent: ElementId, id: &str, group: Option<&str>) -> Menu {
    let container = doc.append_new(parent, "details");
    doc.set_attribute(container, "class", "mega-menu");
    doc.set_attribute(container, "id", id);
    if let Some(group) = group {
        doc.set_attribute(container, "data-disclosure-group", group);
    }
    let summary = doc.append_new(container, "summary");
    doc.set_text(summary, id);
    let panel = doc.append_new(container, "div");
    doc.set_attribute(panel, "class", "mega-menu__content");
    doc.append_new(panel, "a");
    Menu {
        container,
        summary,
        panel,
    }
}

fn setup(count: usize) -> (MegaMenus<SimulatedPlatform>, Vec<Menu>, ElementId) {
    setup_with(count, SimulatedPlatform::new())
}

fn setup_with(
    count: usize,
    platform: SimulatedPlatform,
) -> (MegaMenus<SimulatedPlatform>, Vec<Menu>, ElementId) {
    let mut doc = Document::new();
    let nav = doc.append_new(doc.root(), "nav");
    let menus: Vec<Menu> = (0..count)
        .map(|i| add_menu(&mut doc, nav, &format!("menu-{i}"), None))
        .collect();
    let outside = doc.append_new(doc.root(), "main");
    doc.enable_history();
    let mut runtime = MegaMenus::new(&DisclosureConfig::default(), doc, platform).unwrap();
    let root = runtime.document().root();
    let report = runtime.rescan(root);
    assert_eq!(report.bound.len(), count);
    (runtime, menus, outside)
}

fn key(runtime: &MegaMenus<SimulatedPlatform>, menu: &Menu) -> InstanceKey {
    runtime.key_for(menu.container).unwrap()
}

fn is_open_attr(runtime: &MegaMenus<SimulatedPlatform>, menu: &Menu) -> bool {
    runtime.document().has_attribute(menu.container, "open")
}

fn panel_interactive(runtime: &MegaMenus<SimulatedPlatform>, menu: &Menu) -> bool {
    let doc = runtime.document();
    !doc.has_attribute(menu.panel, "hidden")
        && doc.style(menu.panel).pointer_events == PointerEvents::Auto
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

#[test]
fn bound_menus_start_closed_and_hidden() {
    let (runtime, menus, _) = setup(2);
    for menu in &menus {
        assert_eq!(runtime.state(key(&runtime, menu)), Some(LogicalState::Closed));
        assert!(!is_open_attr(&runtime, menu));
        assert!(!panel_interactive(&runtime, menu));
        assert_eq!(runtime.document().style(menu.panel).opacity, 0.0);
    }
    let first = runtime.controller(key(&runtime, &menus[0])).unwrap();
    assert_eq!(first.id(), "menu-0");
    assert_eq!(first.group(), &GroupId::Document);
}

#[test]
fn rescan_is_idempotent() {
    let (mut runtime, _, _) = setup(3);
    let root = runtime.document().root();
    let report = runtime.rescan(root);
    assert!(report.bound.is_empty());
    assert_eq!(report.already_bound, 3);
    assert_eq!(runtime.registry().len(), 3);
}

#[test]
fn markup_open_at_bind_time_is_respected_once_per_group() {
    let mut doc = Document::new();
    let body = doc.root();
    let a = add_menu(&mut doc, body, "a", None);
    let b = add_menu(&mut doc, body, "b", None);
    doc.set_attribute(a.container, "open", "");
    doc.set_attribute(b.container, "open", "");
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
    let root = runtime.document().root();
    runtime.rescan(root);

    assert_eq!(runtime.state(key(&runtime, &a)), Some(LogicalState::Open));
    assert_eq!(runtime.state(key(&runtime, &b)), Some(LogicalState::Closed));
    assert!(!runtime.document().has_attribute(b.container, "open"));
}

#[test]
fn container_without_id_gets_positional_id() {
    let mut doc = Document::new();
    let body = doc.root();
    let menu = add_menu(&mut doc, body, "x", None);
    doc.remove_attribute(menu.container, "id");
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
    let root = runtime.document().root();
    runtime.rescan(root);
    assert_eq!(runtime.controller(key(&runtime, &menu)).unwrap().id(), "#0");
}

#[test]
fn incomplete_markup_binds_when_panel_arrives() {
    let mut doc = Document::new();
    let container = doc.append_new(doc.root(), "details");
    doc.set_attribute(container, "class", "mega-menu");
    doc.append_new(container, "summary");
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
    let root = runtime.document().root();

    let report = runtime.rescan(root);
    assert!(report.bound.is_empty());
    assert!(matches!(
        report.incomplete.as_slice(),
        [BindError::MissingPanel { container: c, .. }] if *c == container
    ));
    assert_eq!(runtime.pending_binds(), 1);

    runtime.advance(Duration::from_secs(2));
    let panel = runtime.document_mut().append_new(container, "div");
    runtime
        .document_mut()
        .set_attribute(panel, "class", "mega-menu__content");
    runtime.flush();

    assert!(runtime.key_for(container).is_some());
    assert_eq!(runtime.pending_binds(), 0);
    assert_eq!(runtime.pending_timers(), 0);
}

#[test]
fn incomplete_markup_is_abandoned_after_retry_window() {
    let mut doc = Document::new();
    let container = doc.append_new(doc.root(), "details");
    doc.set_attribute(container, "class", "mega-menu");
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
    let root = runtime.document().root();
    runtime.rescan(root);

    runtime.advance(Duration::from_secs(10));
    assert!(runtime.is_abandoned(container));
    assert_eq!(runtime.pending_binds(), 0);

    let summary = runtime.document_mut().append_new(container, "summary");
    let panel = runtime.document_mut().append_new(container, "div");
    runtime
        .document_mut()
        .set_attribute(panel, "class", "mega-menu__content");
    runtime.flush();
    assert!(runtime.key_for(container).is_none());
    assert!(runtime.rescan(root).bound.is_empty());
    assert!(runtime.document().is_connected(summary));
}

#[test]
fn section_reload_unbinds_detached_and_binds_new_markup() {
    let (mut runtime, menus, _) = setup(2);
    let old_key = key(&runtime, &menus[1]);
    runtime.open(old_key);

    let nav = runtime.document().parent(menus[1].container).unwrap();
    runtime.document_mut().remove(menus[1].container);
    let replacement = add_menu(runtime.document_mut(), nav, "menu-1", None);
    runtime.dispatch(&Event::SectionLoad { scope: nav });

    assert!(runtime.controller(old_key).is_none());
    let new_key = key(&runtime, &replacement);
    assert_ne!(new_key, old_key);
    assert_eq!(runtime.registry().len(), 2);
    assert_eq!(runtime.pending_timers(), 0);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_activation_opens() {
    let (mut runtime, menus, _) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);

    let outcome = runtime.dispatch(&Event::Activate {
        target: menu.summary,
    });
    assert!(outcome.default_prevented);
    assert_eq!(outcome.affected, vec![k]);
    assert_eq!(runtime.state(k), Some(LogicalState::Opening));
    assert!(is_open_attr(&runtime, &menu));
    assert!(panel_interactive(&runtime, &menu));

    runtime.advance(DURATION / 2);
    let mid = runtime.document().style(menu.panel);
    assert!(mid.opacity > 0.0 && mid.opacity < 1.0, "{mid:?}");

    runtime.advance(DURATION / 2);
    assert_eq!(runtime.state(k), Some(LogicalState::Open));
    assert_eq!(runtime.document().style(menu.panel).opacity, 1.0);
    assert_eq!(runtime.document().style(menu.panel).offset_y, 0.0);
}

#[test]
fn activation_inside_panel_is_not_a_toggle() {
    let (mut runtime, menus, _) = setup(1);
    let link = runtime.document().children(menus[0].panel)[0];
    let outcome = runtime.dispatch(&Event::Activate { target: link });
    assert!(!outcome.default_prevented);
    assert!(outcome.affected.is_empty());
}

#[test]
fn scenario_b_outside_pointer_down_closes() {
    let (mut runtime, menus, outside) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);
    runtime.open(k);
    runtime.advance(DURATION);
    assert_eq!(runtime.state(k), Some(LogicalState::Open));

    runtime.dispatch(&Event::PointerDown {
        target: menu.panel,
    });
    assert_eq!(runtime.state(k), Some(LogicalState::Open));

    runtime.dispatch(&Event::PointerDown { target: outside });
    assert_eq!(runtime.state(k), Some(LogicalState::Closing));
    assert!(is_open_attr(&runtime, &menu), "kept until settle");

    runtime.advance(DURATION);
    assert_eq!(runtime.state(k), Some(LogicalState::Closed));
    assert!(!is_open_attr(&runtime, &menu));
    assert!(runtime.document().has_attribute(menu.panel, "hidden"));
    assert_eq!(
        runtime.document().style(menu.panel).pointer_events,
        PointerEvents::None
    );
}

#[test]
fn scenario_c_escape_closes_and_returns_focus() {
    let (mut runtime, menus, _) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);
    runtime.open(k);
    runtime.advance(DURATION);
    let link = runtime.document().children(menu.panel)[0];
    runtime.document_mut().focus(link);

    let press = KeyEvent::new(KeyCode::Escape, link).with_kind(KeyEventKind::Press);
    runtime.dispatch(&Event::Key(press));
    assert_eq!(runtime.state(k), Some(LogicalState::Open), "key-down ignored");

    runtime.dispatch(&Event::Key(KeyEvent::new(KeyCode::Escape, link)));
    assert_eq!(runtime.state(k), Some(LogicalState::Closing));
    assert_eq!(runtime.document().focused(), Some(menu.summary));

    runtime.advance(DURATION);
    assert_eq!(runtime.state(k), Some(LogicalState::Closed));
}

#[test]
fn scenario_d_hover_moves_between_siblings() {
    let (mut runtime, menus, _) = setup(2);
    let (a, b) = (menus[0], menus[1]);
    let (ka, kb) = (key(&runtime, &a), key(&runtime, &b));

    runtime.dispatch(&Event::PointerEnter {
        target: a.container,
    });
    runtime.advance(DURATION);
    assert_eq!(runtime.state(ka), Some(LogicalState::Open));

    runtime.dispatch(&Event::PointerEnter {
        target: b.container,
    });
    assert_eq!(runtime.state(ka), Some(LogicalState::Closing));
    assert_eq!(runtime.state(kb), Some(LogicalState::Opening));
    assert!(!is_open_attr(&runtime, &a), "forced close clears in the same turn");
    assert!(is_open_attr(&runtime, &b));
    assert_eq!(runtime.expanded_in(&GroupId::Document), 1);

    runtime.advance(DURATION);
    assert_eq!(runtime.state(ka), Some(LogicalState::Closed));
    assert_eq!(runtime.state(kb), Some(LogicalState::Open));
}

#[test]
fn hover_leave_closes_after_grace_period() {
    let (mut runtime, menus, _) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);
    runtime.dispatch(&Event::PointerEnter {
        target: menu.container,
    });
    runtime.advance(DURATION);

    runtime.dispatch(&Event::PointerLeave {
        target: menu.container,
    });
    runtime.advance(Duration::from_millis(60));
    assert_eq!(runtime.state(k), Some(LogicalState::Open));

    // Re-entering inside the grace period cancels the close.
    runtime.dispatch(&Event::PointerEnter {
        target: menu.container,
    });
    runtime.advance(Duration::from_millis(200));
    assert_eq!(runtime.state(k), Some(LogicalState::Open));

    runtime.dispatch(&Event::PointerLeave {
        target: menu.container,
    });
    runtime.advance(Duration::from_millis(100));
    assert_eq!(runtime.state(k), Some(LogicalState::Closing));
}

#[test]
fn coarse_pointer_ignores_hover() {
    let (mut runtime, menus, _) = setup(1);
    runtime.set_pointer_capability(PointerCapability::Coarse);
    let outcome = runtime.dispatch(&Event::PointerEnter {
        target: menus[0].container,
    });
    assert!(outcome.affected.is_empty());
    assert_eq!(
        runtime.state(key(&runtime, &menus[0])),
        Some(LogicalState::Closed)
    );
}

#[test]
fn named_groups_are_independent() {
    let mut doc = Document::new();
    let body = doc.root();
    let a = add_menu(&mut doc, body, "a", Some("main"));
    let b = add_menu(&mut doc, body, "b", Some("footer"));
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
    let root = runtime.document().root();
    runtime.rescan(root);
    let (ka, kb) = (key(&runtime, &a), key(&runtime, &b));
    runtime.open(ka);
    runtime.open(kb);
    assert_eq!(runtime.state(ka), Some(LogicalState::Opening));
    assert_eq!(runtime.state(kb), Some(LogicalState::Opening));
    assert_eq!(runtime.expanded_in(&GroupId::Named("main".into())), 1);
}

#[test]
fn opening_closes_only_siblings_in_its_own_group() {
    let mut doc = Document::new();
    let body = doc.root();
    let a = add_menu(&mut doc, body, "a", Some("main"));
    let b = add_menu(&mut doc, body, "b", Some("main"));
    let c = add_menu(&mut doc, body, "c", Some("footer"));
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
    let root = runtime.document().root();
    runtime.rescan(root);
    let (ka, kb, kc) = (key(&runtime, &a), key(&runtime, &b), key(&runtime, &c));
    runtime.open(ka);
    runtime.open(kc);
    runtime.advance(DURATION);

    runtime.open(kb);
    assert_eq!(runtime.state(ka), Some(LogicalState::Closing));
    assert!(!is_open_attr(&runtime, &a));
    assert_eq!(runtime.state(kb), Some(LogicalState::Opening));
    assert_eq!(runtime.state(kc), Some(LogicalState::Open));
    assert!(is_open_attr(&runtime, &c));
    assert_eq!(runtime.expanded_in(&GroupId::Named("main".into())), 1);
    assert_eq!(runtime.expanded_in(&GroupId::Named("footer".into())), 1);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn liveness_without_completion_notifications() {
    let (mut runtime, menus, _) = setup(1);
    let k = key(&runtime, &menus[0]);
    runtime.platform_mut().set_withhold_notifications(true);

    runtime.open(k);
    runtime.advance(DURATION);
    assert_eq!(runtime.state(k), Some(LogicalState::Opening));
    runtime.advance(SLACK);
    assert_eq!(runtime.state(k), Some(LogicalState::Open));

    runtime.close(k, false);
    runtime.advance(DURATION + SLACK);
    assert_eq!(runtime.state(k), Some(LogicalState::Closed));
    assert!(runtime.document().has_attribute(menus[0].panel, "hidden"));
    assert_eq!(runtime.pending_timers(), 0);
}

#[test]
fn repeated_open_starts_one_transition() {
    let (mut runtime, menus, _) = setup(1);
    let k = key(&runtime, &menus[0]);
    runtime.open(k);
    runtime.open(k);
    runtime.advance(DURATION);
    runtime.open(k);
    runtime.open(k);
    assert_eq!(runtime.platform().played(), 1);
    assert_eq!(runtime.controller(k).unwrap().transitions_started(), 1);
}

#[test]
fn close_right_after_open_ignores_stale_completion() {
    let (mut runtime, menus, _) =
        setup_with(1, SimulatedPlatform::new().with_stale_notifications());
    let menu = menus[0];
    let k = key(&runtime, &menu);

    runtime.open(k);
    let first = runtime.controller(k).unwrap().handle().unwrap().clone();
    runtime.advance(Duration::from_millis(100));
    runtime.close(k, false);
    let second = runtime.controller(k).unwrap().handle().unwrap().clone();
    assert_ne!(first.generation(), second.generation());
    assert_eq!(runtime.platform().running_at(runtime.now()), 1);
    // Canonical restart: closing begins from the fully shown frame.
    assert_eq!(runtime.document().style(menu.panel).opacity, 1.0);

    // The superseded opening completes at 350ms; it must not settle anything.
    runtime.advance_to(Duration::from_millis(360));
    assert_eq!(runtime.state(k), Some(LogicalState::Closing));

    runtime.advance_to(Duration::from_millis(450));
    assert_eq!(runtime.state(k), Some(LogicalState::Closed));
    assert!(!is_open_attr(&runtime, &menu));
}

#[test]
fn external_open_write_is_reverted_then_replayed() {
    let (mut runtime, menus, _) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);
    let before = runtime.document().history().len();

    runtime.document_mut().set_attribute(menu.container, "open", "");
    runtime.flush();
    assert_eq!(runtime.state(k), Some(LogicalState::Opening));
    assert!(is_open_attr(&runtime, &menu));

    let writes: Vec<(Option<String>, WriteOrigin)> = runtime.document().history()[before..]
        .iter()
        .filter_map(|m| match m {
            Mutation::Attribute {
                element,
                name,
                new,
                origin,
                ..
            } if *element == menu.container && name == "open" => Some((new.clone(), *origin)),
            _ => None,
        })
        .collect();
    assert_eq!(
        writes,
        vec![
            (Some(String::new()), WriteOrigin::External),
            (None, WriteOrigin::Controller),
            (Some(String::new()), WriteOrigin::Controller),
        ]
    );

    runtime.advance(DURATION);
    assert_eq!(runtime.state(k), Some(LogicalState::Open));
}

#[test]
fn external_close_write_runs_the_closing_transition() {
    let (mut runtime, menus, _) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);
    runtime.open(k);
    runtime.advance(DURATION);

    runtime.document_mut().remove_attribute(menu.container, "open");
    runtime.flush();
    assert_eq!(runtime.state(k), Some(LogicalState::Closing));
    assert!(is_open_attr(&runtime, &menu));
    runtime.advance(DURATION);
    assert!(!is_open_attr(&runtime, &menu));
}

#[test]
fn forced_close_of_closed_instance_reapplies_closed_attributes() {
    let (mut runtime, menus, _) = setup(1);
    let menu = menus[0];
    let k = key(&runtime, &menu);
    runtime.document_mut().remove_attribute(menu.panel, "hidden");
    runtime.flush();

    runtime.close(k, true);
    assert_eq!(runtime.state(k), Some(LogicalState::Closed));
    assert!(runtime.document().has_attribute(menu.panel, "hidden"));
    assert_eq!(runtime.platform().played(), 0);
}

#[test]
fn unsupported_platform_flips_immediately() {
    let mut doc = Document::new();
    let body = doc.root();
    let menu = add_menu(&mut doc, body, "plain", None);
    let mut runtime =
        MegaMenus::new(&DisclosureConfig::default(), doc, UnsupportedPlatform).unwrap();
    let root = runtime.document().root();
    runtime.rescan(root);
    let k = runtime.key_for(menu.container).unwrap();

    runtime.dispatch(&Event::Activate {
        target: menu.summary,
    });
    assert_eq!(runtime.state(k), Some(LogicalState::Open));
    assert_eq!(runtime.document().style(menu.panel).opacity, 1.0);
    assert_eq!(runtime.pending_timers(), 0);

    runtime.dispatch(&Event::Activate {
        target: menu.summary,
    });
    assert_eq!(runtime.state(k), Some(LogicalState::Closed));
    assert!(runtime.document().has_attribute(menu.panel, "hidden"));
    assert!(!runtime.document().has_attribute(menu.container, "open"));
}

#[test]
fn unbind_cancels_transition_and_timers() {
    let (mut runtime, menus, _) = setup(1);
    let k = key(&runtime, &menus[0]);
    runtime.open(k);
    assert_eq!(runtime.pending_timers(), 1);
    assert!(runtime.unbind(k));
    assert_eq!(runtime.pending_timers(), 0);
    assert!(!runtime.unbind(k));
    assert_eq!(runtime.platform().running_at(runtime.now()), 0);
}
