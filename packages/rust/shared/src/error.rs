//! Error types for metaenrich.
//!
//! Library crates use [`EnrichError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for every pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required secret is neither in the environment nor mounted.
    #[error("missing secret '{name}': {hint}")]
    MissingSecret { name: String, hint: String },

    /// An upstream stage artifact does not exist.
    #[error("missing artifact {path:?}: {hint}")]
    MissingArtifact { path: PathBuf, hint: String },

    /// An upstream artifact exists but lacks a required field.
    #[error("missing field '{field}' in {path:?}")]
    MissingField { field: String, path: PathBuf },

    /// User input or data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Could not obtain a bearer credential.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Transport-level HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// The catalog service answered with an error or an unexpected shape.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Query engine login, job or result failure.
    #[error("query engine error: {0}")]
    Query(String),

    /// Browser launch or rendering failure.
    #[error("capture error: {0}")]
    Capture(String),

    /// Language model or document-text failure.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// YAML/JSON/CSV encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EnrichError>;

impl EnrichError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Missing upstream artifact, with a hint naming the stage that produces it.
    pub fn missing_artifact(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        Self::MissingArtifact {
            path: path.into(),
            hint: hint.into(),
        }
    }

    /// Missing field in an upstream artifact.
    pub fn missing_field(field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingField {
            field: field.into(),
            path: path.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
