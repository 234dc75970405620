#![forbid(unsafe_code)]

//! Storefront behaviors that live next to the mega-menu.
//!
//! Each behavior works against the same [`vitrine_core::dom::Document`] and
//! host-driven time as the disclosure runtime. Side effects the document
//! model cannot perform (network requests, constructing a slider, scrolling)
//! go through small host traits.
//!
//! - [`StickyBar`]: add-to-cart bar that appears past the product info block.
//! - [`CarouselHydrator`]: hydrates carousel roots through a [`SliderFactory`].
//! - [`ArticleAugmenter`]: fills empty article lists in predictive search
//!   through an [`ArticleSource`].
//! - [`ProductForm`]: add-to-cart submission through a [`CartClient`].

pub mod carousel;
pub mod error;
pub mod product_form;
pub mod search_augment;
pub mod sticky_bar;

pub use carousel::{
    CarouselConfig, CarouselHydrator, SlideMode, SliderFactory, SliderParams, SlidesPerView,
};
pub use error::StorefrontError;
pub use product_form::{
    CartAddRequest, CartClient, CartResponse, CartSurface, CompleteOutcome, ProductForm,
    SubmitOutcome,
};
pub use search_augment::{
    Article, ArticleAugmenter, ArticleSource, Populated, parse_suggest_response, suggest_url,
};
pub use sticky_bar::{BarAction, LinkGroup, StickyBar, StickyBarConfig};
