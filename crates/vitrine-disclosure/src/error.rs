#![forbid(unsafe_code)]

//! Error types.
//!
//! Nothing in the disclosure runtime is fatal. [`BindError`] values are
//! reported through [`crate::BindReport`] and logged; [`ConfigError`] is only
//! returned while loading or resolving a [`crate::DisclosureConfig`].

use thiserror::Error;
use vitrine_core::dom::ElementId;

/// Why a container could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// No element matching the trigger selector inside the container.
    #[error("container {container} has no trigger matching `{selector}`")]
    MissingTrigger {
        /// The container being bound.
        container: ElementId,
        /// The trigger selector that found nothing.
        selector: String,
    },
    /// No element matching the panel selector inside the container.
    #[error("container {container} has no panel matching `{selector}`")]
    MissingPanel {
        /// The container being bound.
        container: ElementId,
        /// The panel selector that found nothing.
        selector: String,
    },
}

impl BindError {
    /// The container that failed to bind.
    #[must_use]
    pub const fn container(&self) -> ElementId {
        match self {
            Self::MissingTrigger { container, .. } | Self::MissingPanel { container, .. } => {
                *container
            }
        }
    }
}

/// Errors that can occur when loading or resolving a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::dom::Document;

    #[test]
    fn bind_error_names_container_and_selector() {
        let container = Document::new().root();
        let err = BindError::MissingPanel {
            container,
            selector: ".mega-menu__content".into(),
        };
        assert_eq!(err.container(), container);
        let text = err.to_string();
        assert!(text.contains(".mega-menu__content"), "{text}");
        assert!(text.contains(&container.to_string()), "{text}");
    }

    #[test]
    fn validation_messages_are_joined() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "invalid configuration: a; b");
    }
}
