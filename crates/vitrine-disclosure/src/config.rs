#![forbid(unsafe_code)]

//! Tunable parameters for the disclosure runtime.
//!
//! [`DisclosureConfig`] is plain data with defaults equal to the storefront's
//! built-in constants, so `DisclosureConfig::default()` reproduces the stock
//! mega-menu. With the `config` feature it can be loaded from TOML or JSON:
//!
//! ```toml
//! duration_ms = 280
//! easing = "ease-out"
//!
//! [selectors]
//! container = "details.header-menu"
//! ```
//!
//! ```rust,ignore
//! let config = DisclosureConfig::from_toml_file("vitrine.toml")?;
//! let menus = MegaMenus::new(&config, document, platform)?;
//! ```
//!
//! [`DisclosureConfig::resolve`] validates the data and parses selectors and
//! the easing curve once, producing the [`ResolvedConfig`] the runtime uses.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use vitrine_core::animation::{Easing, Frame, Timing};
use vitrine_core::selector::Selector;

use crate::error::ConfigError;

/// Upper bound for any configured duration.
const MAX_DURATION_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// DisclosureConfig
// ---------------------------------------------------------------------------

/// Disclosure runtime configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DisclosureConfig {
    /// Transition duration in milliseconds. Default: 350.
    pub duration_ms: u64,
    /// Extra time past `duration_ms` before the fallback timer force-settles.
    /// Default: 50.
    pub slack_ms: u64,
    /// CSS timing function. Default: `cubic-bezier(.2,.7,.3,1)`.
    pub easing: String,
    /// Vertical offset of the closed frame, in pixels. Default: -16.
    pub closed_offset_px: f32,
    /// Grace period after the pointer leaves before closing. Default: 100.
    pub hover_close_delay_ms: u64,
    /// How long an incomplete container is watched for late children.
    /// Default: 10 000.
    pub bind_retry_window_ms: u64,
    /// Attribute whose presence means "expanded". Default: `open`.
    pub structural_attribute: String,
    /// Container attribute naming the sibling group.
    /// Default: `data-disclosure-group`.
    pub group_attribute: String,
    /// Part selectors.
    pub selectors: SelectorConfig,
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            duration_ms: 350,
            slack_ms: 50,
            easing: "cubic-bezier(.2,.7,.3,1)".to_string(),
            closed_offset_px: -16.0,
            hover_close_delay_ms: 100,
            bind_retry_window_ms: 10_000,
            structural_attribute: "open".to_string(),
            group_attribute: "data-disclosure-group".to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// Selectors locating a disclosure's parts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SelectorConfig {
    /// Disclosure container. Default: `details.mega-menu`.
    pub container: String,
    /// Trigger, searched inside the container. Default: `summary`.
    pub trigger: String,
    /// Panel, searched inside the container. Default: `.mega-menu__content`.
    pub panel: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            container: "details.mega-menu".to_string(),
            trigger: "summary".to_string(),
            panel: ".mega-menu__content".to_string(),
        }
    }
}

impl DisclosureConfig {
    /// Parse from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check every field; returns one message per problem.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.duration_ms == 0 || self.duration_ms > MAX_DURATION_MS {
            errors.push(format!(
                "duration_ms must be in 1..={MAX_DURATION_MS}, got {}",
                self.duration_ms
            ));
        }
        if self.slack_ms > MAX_DURATION_MS {
            errors.push(format!(
                "slack_ms must be at most {MAX_DURATION_MS}, got {}",
                self.slack_ms
            ));
        }
        if self.hover_close_delay_ms > MAX_DURATION_MS {
            errors.push(format!(
                "hover_close_delay_ms must be at most {MAX_DURATION_MS}, got {}",
                self.hover_close_delay_ms
            ));
        }
        if let Err(e) = self.easing.parse::<Easing>() {
            errors.push(format!("easing: {e}"));
        }
        if !self.closed_offset_px.is_finite() {
            errors.push(format!(
                "closed_offset_px must be finite, got {}",
                self.closed_offset_px
            ));
        }
        if self.structural_attribute.trim().is_empty() {
            errors.push("structural_attribute must not be empty".to_string());
        }
        if self.group_attribute.trim().is_empty() {
            errors.push("group_attribute must not be empty".to_string());
        }
        for (field, source) in [
            ("selectors.container", &self.selectors.container),
            ("selectors.trigger", &self.selectors.trigger),
            ("selectors.panel", &self.selectors.panel),
        ] {
            if let Err(e) = Selector::parse(source) {
                errors.push(format!("{field}: {e}"));
            }
        }

        errors
    }

    /// Validate and compile into the form the runtime consumes.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        let invalid = |msg: String| ConfigError::Validation(vec![msg]);
        let easing = self
            .easing
            .parse::<Easing>()
            .map_err(|e| invalid(e.to_string()))?;
        let selector = |s: &str| Selector::parse(s).map_err(|e| invalid(e.to_string()));

        Ok(ResolvedConfig {
            timing: Timing {
                duration: Duration::from_millis(self.duration_ms),
                easing,
            },
            slack: Duration::from_millis(self.slack_ms),
            closed_frame: Frame::hidden(self.closed_offset_px),
            hover_close_delay: Duration::from_millis(self.hover_close_delay_ms),
            bind_retry_window: Duration::from_millis(self.bind_retry_window_ms),
            structural_attribute: self.structural_attribute.clone(),
            group_attribute: self.group_attribute.clone(),
            container: selector(&self.selectors.container)?,
            trigger: selector(&self.selectors.trigger)?,
            panel: selector(&self.selectors.panel)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ResolvedConfig
// ---------------------------------------------------------------------------

/// Validated configuration with parsed selectors and easing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Transition duration and easing.
    pub timing: Timing,
    /// Fallback slack past the duration.
    pub slack: Duration,
    /// The collapsed visual frame.
    pub closed_frame: Frame,
    /// Hover-leave grace period.
    pub hover_close_delay: Duration,
    /// Bind retry window for incomplete containers.
    pub bind_retry_window: Duration,
    /// Structural attribute name.
    pub structural_attribute: String,
    /// Group attribute name.
    pub group_attribute: String,
    /// Container selector.
    pub container: Selector,
    /// Trigger selector.
    pub trigger: Selector,
    /// Panel selector.
    pub panel: Selector,
}
