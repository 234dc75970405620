#![forbid(unsafe_code)]

//! Scenario files.
//!
//! A scenario describes a navigation bar of mega-menus, the runtime
//! configuration, and a script of steps. It is written in TOML:
//!
//! ```toml
//! name = "hover hand-off"
//!
//! [config]
//! duration_ms = 300
//!
//! [[menus]]
//! id = "shop"
//!
//! [[menus]]
//! id = "learn"
//!
//! [[steps]]
//! action = "hover-enter"
//! menu = "shop"
//!
//! [[steps]]
//! action = "advance"
//! ms = 400
//!
//! [[steps]]
//! action = "expect"
//! menu = "shop"
//! state = "open"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use vitrine_core::dom::{Document, ElementId};
use vitrine_core::event::PointerCapability;
use vitrine_disclosure::DisclosureConfig;

use crate::error::{ReplayError, Result};

/// A parsed scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: DisclosureConfig,
    #[serde(default)]
    pub platform: PlatformSpec,
    #[serde(default)]
    pub pointer: PointerSpec,
    pub menus: Vec<MenuSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Simulated host capabilities.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformSpec {
    /// Whether the host can animate at all.
    pub animation: bool,
    /// Start with completion notifications withheld.
    pub withhold_notifications: bool,
    /// Keep delivering notifications for cancelled animations.
    pub stale_notifications: bool,
}

impl Default for PlatformSpec {
    fn default() -> Self {
        Self {
            animation: true,
            withhold_notifications: false,
            stale_notifications: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerSpec {
    #[default]
    Fine,
    Coarse,
}

impl From<PointerSpec> for PointerCapability {
    fn from(spec: PointerSpec) -> Self {
        match spec {
            PointerSpec::Fine => Self::Fine,
            PointerSpec::Coarse => Self::Coarse,
        }
    }
}

/// One `<details class="mega-menu">` in the navigation bar.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuSpec {
    pub id: String,
    /// Value of the group attribute; absent means the document group.
    #[serde(default)]
    pub group: Option<String>,
    /// Markup starts with the structural attribute set.
    #[serde(default)]
    pub open: bool,
    /// Markup includes the panel. Without it the menu binds only after an
    /// `add-panel` step.
    #[serde(default = "yes")]
    pub panel: bool,
}

const fn yes() -> bool {
    true
}

/// A scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Click the menu's trigger.
    Activate { menu: String },
    /// Click a link inside the menu's panel.
    ActivateLink { menu: String },
    HoverEnter { menu: String },
    HoverLeave { menu: String },
    /// Press Escape with focus inside the menu.
    Escape { menu: String },
    /// Release a key, named as DOM `KeyboardEvent.key`, with focus on the
    /// menu's trigger.
    Key { menu: String, key: String },
    /// Press the pointer on a menu, or outside every menu when absent.
    PointerDown {
        #[serde(default)]
        menu: Option<String>,
    },
    /// Call the external `open` capability.
    Open { menu: String },
    /// Call the external `close` capability.
    Close {
        menu: String,
        #[serde(default)]
        force: bool,
    },
    /// Another script sets the structural attribute.
    SetOpen { menu: String },
    /// Another script removes the structural attribute.
    ClearOpen { menu: String },
    /// Inject the panel of a menu declared with `panel = false`.
    AddPanel { menu: String },
    /// Re-render a menu's section (or the whole bar when absent).
    Reload {
        #[serde(default)]
        menu: Option<String>,
    },
    /// Switch pointer capability.
    Pointer { capability: PointerSpec },
    /// Withhold or deliver platform completion notifications.
    Withhold { enabled: bool },
    /// Advance time.
    Advance { ms: u64 },
    /// Assert a menu's logical state.
    Expect { menu: String, state: String },
}

impl Step {
    /// Kebab-case action name, as written in the scenario.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::ActivateLink { .. } => "activate-link",
            Self::HoverEnter { .. } => "hover-enter",
            Self::HoverLeave { .. } => "hover-leave",
            Self::Escape { .. } => "escape",
            Self::Key { .. } => "key",
            Self::PointerDown { .. } => "pointer-down",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::SetOpen { .. } => "set-open",
            Self::ClearOpen { .. } => "clear-open",
            Self::AddPanel { .. } => "add-panel",
            Self::Reload { .. } => "reload",
            Self::Pointer { .. } => "pointer",
            Self::Withhold { .. } => "withhold",
            Self::Advance { .. } => "advance",
            Self::Expect { .. } => "expect",
        }
    }
}

impl Scenario {
    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self> {
        toml::from_str(source).map_err(|source| ReplayError::Scenario {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source, path)
    }

    /// Build the navigation markup.
    #[must_use]
    pub fn build_document(&self) -> (Document, Markup) {
        let mut doc = Document::new();
        let body = doc.root();
        let nav = doc.append_new(body, "nav");
        let outside = doc.append_new(body, "main");
        let mut menus = BTreeMap::new();
        for spec in &self.menus {
            let container = doc.append_new(nav, "details");
            doc.set_attribute(container, "class", "mega-menu");
            doc.set_attribute(container, "id", &spec.id);
            if let Some(group) = &spec.group {
                doc.set_attribute(container, &self.config.group_attribute, group);
            }
            if spec.open {
                doc.set_attribute(container, &self.config.structural_attribute, "");
            }
            let trigger = doc.append_new(container, "summary");
            doc.set_text(trigger, &spec.id);
            let mut handles = MenuMarkup {
                container,
                trigger,
                panel: None,
                link: None,
            };
            if spec.panel {
                handles.attach_panel(&mut doc);
            }
            menus.insert(spec.id.clone(), handles);
        }
        (doc, Markup { nav, outside, menus })
    }
}

/// Element handles for the generated markup.
#[derive(Debug, Clone)]
pub struct Markup {
    pub nav: ElementId,
    pub outside: ElementId,
    pub menus: BTreeMap<String, MenuMarkup>,
}

#[derive(Debug, Clone, Copy)]
pub struct MenuMarkup {
    pub container: ElementId,
    pub trigger: ElementId,
    pub panel: Option<ElementId>,
    pub link: Option<ElementId>,
}

impl MenuMarkup {
    /// Append the panel (with one link) to the container.
    pub fn attach_panel(&mut self, doc: &mut Document) {
        let panel = doc.append_new(self.container, "div");
        doc.set_attribute(panel, "class", "mega-menu__content");
        let link = doc.append_new(panel, "a");
        doc.set_attribute(link, "href", "#");
        self.panel = Some(panel);
        self.link = Some(link);
    }
}
