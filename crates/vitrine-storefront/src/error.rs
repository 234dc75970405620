#![forbid(unsafe_code)]

//! Collaborator errors.

use thiserror::Error;

/// Failures surfaced by storefront behaviors and their host adapters.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// A required element is absent.
    #[error("missing {what} (`{locator}`)")]
    MissingElement {
        /// Role of the element.
        what: &'static str,
        /// Id or selector that found nothing.
        locator: String,
    },
    /// The host could not complete a request.
    #[error("request failed: {0}")]
    Request(String),
    /// A response body was not the expected JSON.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The slider library has not loaded yet.
    #[error("slider library not loaded")]
    SliderUnavailable,
}

impl StorefrontError {
    pub(crate) fn missing(what: &'static str, locator: impl Into<String>) -> Self {
        Self::MissingElement {
            what,
            locator: locator.into(),
        }
    }
}
