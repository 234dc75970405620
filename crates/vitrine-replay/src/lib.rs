#![forbid(unsafe_code)]

//! Scenario replay for the mega-menu runtime.
//!
//! Loads a TOML scenario (menus, configuration, scripted input and time
//! steps), runs it through [`vitrine_disclosure::MegaMenus`] on a simulated
//! animation platform, and emits one trace record per step.

use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod error;
pub mod replay;
pub mod scenario;
pub mod trace;

pub use error::{ReplayError, Result};

/// Install the stderr subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
