use std::path::PathBuf;

use thiserror::Error;
use vitrine_disclosure::ConfigError;

pub type Result<T> = std::result::Result<T, ReplayError>;

/// Exit code for an invalid configuration.
pub const EXIT_INVALID_CONFIG: i32 = 2;
/// Exit code for a failed `expect` step.
pub const EXIT_EXPECTATION_FAILED: i32 = 3;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scenario parse error in {path}: {source}")]
    Scenario {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("step {step}: unknown menu `{menu}`")]
    UnknownMenu { step: usize, menu: String },

    #[error("step {step}: {message}")]
    InvalidStep { step: usize, message: String },

    #[error("step {step}: expected `{menu}` to be {expected}, found {actual}")]
    Expectation {
        step: usize,
        menu: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported config format: {path} (expected .toml or .json)")]
    UnsupportedFormat { path: PathBuf },
}

impl ReplayError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_INVALID_CONFIG,
            Self::Expectation { .. } => EXIT_EXPECTATION_FAILED,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid_step(step: usize, message: impl Into<String>) -> Self {
        Self::InvalidStep {
            step,
            message: message.into(),
        }
    }
}
