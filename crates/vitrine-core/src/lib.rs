#![forbid(unsafe_code)]

//! Core: document model, input events, deterministic time, and animation.
//!
//! # Role in Vitrine
//! `vitrine-core` is the host boundary. The embedding environment (a WASM
//! shim, the replay CLI, or a test) mirrors storefront markup into a
//! [`dom::Document`], pushes canonical [`event::Event`] values, and advances a
//! monotonic clock explicitly. Nothing in this crate blocks or spawns threads.
//!
//! # Primary responsibilities
//! - **Document**: arena of elements with attributes, style, focus, and a
//!   queue of [`dom::Mutation`] records tagged with their [`dom::WriteOrigin`].
//! - **Selector**: the small compound-selector language used to address
//!   containers, triggers, and panels.
//! - **Event**: canonical input events (activation, hover, keys, pointer-down,
//!   section reload).
//! - **Clock / TimerQueue**: host-driven time and deadline scheduling.
//! - **Animation**: easing curves, keyframes, and the [`animation::AnimationPlatform`]
//!   seam with a simulated implementation.

pub mod animation;
pub mod clock;
pub mod dom;
pub mod event;
pub mod selector;
