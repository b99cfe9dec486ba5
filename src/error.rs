//! Error types for MDF loading, model construction and diffing

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Result type for MDF operations
pub type Result<T> = std::result::Result<T, MdfError>;

/// MDF errors
#[derive(Error, Debug)]
pub enum MdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed MDF input in {source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error("MDF is missing required top-level section '{0}'")]
    MissingSection(&'static str),

    #[error("MDF instance failed schema validation:\n{0}")]
    Validation(String),

    #[error("Invalid MDF schema: {0}")]
    Schema(String),

    #[error("Could not fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("MDF errors found ({} error(s), {} warning(s)); see log output", .0.error_count(), .0.warning_count())]
    Build(Diagnostics),

    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No model available: {0}")]
    NoModel(String),
}

impl MdfError {
    pub(crate) fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

impl From<config_crate::ConfigError> for MdfError {
    fn from(err: config_crate::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
