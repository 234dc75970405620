#![forbid(unsafe_code)]

//! Vitrine public facade crate.
//!
//! Re-exports the document model, the mega-menu runtime, and (with the
//! `storefront` feature) the storefront behaviors, plus a prelude for
//! day-to-day use.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use vitrine_core::animation::{AnimationPlatform, SimulatedPlatform, UnsupportedPlatform};
pub use vitrine_core::clock::{Clock, DeterministicClock, WallClock};
pub use vitrine_core::dom::{Document, ElementId, Mutation, WriteOrigin};
pub use vitrine_core::event::{Event, KeyCode, KeyEvent, PointerCapability};
pub use vitrine_core::selector::Selector;

// --- Disclosure re-exports -------------------------------------------------

pub use vitrine_disclosure::{
    BindError, ConfigError, Dispatch, DisclosureConfig, GroupId, InstanceKey, LogicalState,
    MegaMenus,
};

// --- Storefront re-exports -------------------------------------------------

#[cfg(feature = "storefront")]
pub use vitrine_storefront::{
    ArticleAugmenter, CarouselHydrator, ProductForm, StickyBar, StorefrontError,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error for hosts embedding Vitrine.
#[derive(Debug)]
pub enum Error {
    /// Invalid disclosure configuration.
    Config(ConfigError),
    /// A storefront behavior failed.
    #[cfg(feature = "storefront")]
    Storefront(StorefrontError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            #[cfg(feature = "storefront")]
            Self::Storefront(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            #[cfg(feature = "storefront")]
            Self::Storefront(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "storefront")]
impl From<StorefrontError> for Error {
    fn from(err: StorefrontError) -> Self {
        Self::Storefront(err)
    }
}

/// Standard result type for Vitrine hosts.
pub type Result<T> = std::result::Result<T, Error>;

/// Build a mega-menu runtime over `doc` on the simulated platform and bind
/// every menu in it.
pub fn mega_menus(config: &DisclosureConfig, doc: Document) -> Result<MegaMenus> {
    let mut menus = MegaMenus::new(config, doc, SimulatedPlatform::new())?;
    let root = menus.document().root();
    menus.rescan(root);
    Ok(menus)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Document, ElementId, Error, Event, KeyCode, KeyEvent, LogicalState, MegaMenus,
        PointerCapability, Result, mega_menus,
    };

    pub use crate::{core, disclosure};

    #[cfg(feature = "storefront")]
    pub use crate::storefront;
}

pub use vitrine_core as core;
pub use vitrine_disclosure as disclosure;
#[cfg(feature = "storefront")]
pub use vitrine_storefront as storefront;
