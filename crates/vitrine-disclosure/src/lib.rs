#![forbid(unsafe_code)]

//! Animated disclosure controller for storefront mega-menus.
//!
//! # Role in Vitrine
//! A mega-menu is a `<details>` container whose panel fades and slides in
//! when opened. Native `<details>` flips its `open` attribute instantly, so
//! this crate takes over: it animates the panel, keeps `open`, `hidden`, and
//! pointer interactivity consistent with a logical state machine, closes
//! sibling menus in the same group, and reverts and replays writes to `open`
//! made by other scripts.
//!
//! # Components
//! - [`DisclosureController`]: per-instance state machine.
//! - [`AnimationDriver`]: per-instance transition handle with a fallback
//!   timer.
//! - [`AttributeSynchronizer`]: structural and interactivity attributes.
//! - [`SiblingCoordinator`]: one expanded instance per group.
//! - [`EventRouter`]: input events to commands.
//! - [`MegaMenus`]: the runtime that owns all of the above.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use vitrine_core::animation::SimulatedPlatform;
//! use vitrine_core::dom::Document;
//! use vitrine_core::event::Event;
//! use vitrine_disclosure::{DisclosureConfig, LogicalState, MegaMenus};
//!
//! let mut doc = Document::new();
//! let details = doc.append_new(doc.root(), "details");
//! doc.set_attribute(details, "class", "mega-menu");
//! let summary = doc.append_new(details, "summary");
//! let panel = doc.append_new(details, "div");
//! doc.set_attribute(panel, "class", "mega-menu__content");
//!
//! let mut menus =
//!     MegaMenus::new(&DisclosureConfig::default(), doc, SimulatedPlatform::new()).unwrap();
//! let root = menus.document().root();
//! let key = menus.rescan(root).bound[0];
//!
//! let outcome = menus.dispatch(&Event::Activate { target: summary });
//! assert!(outcome.default_prevented);
//! assert_eq!(menus.state(key), Some(LogicalState::Opening));
//!
//! menus.advance(Duration::from_millis(350));
//! assert_eq!(menus.state(key), Some(LogicalState::Open));
//! ```

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod state;
pub mod sync;
pub mod turn;

pub use config::{DisclosureConfig, ResolvedConfig, SelectorConfig};
pub use controller::DisclosureController;
pub use coordinator::{Disclosure, SiblingCoordinator};
pub use driver::{AnimationDriver, AnimationHandle, Started};
pub use error::{BindError, ConfigError};
pub use registry::{GroupId, InstanceKey, Registry};
pub use router::{Command, EventRouter, Routed};
pub use runtime::{BindReport, Dispatch, MegaMenus};
pub use state::{Direction, LogicalState};
pub use sync::{AttributeSynchronizer, Parts, Reissue};
pub use turn::{TimerEvent, Turn};
