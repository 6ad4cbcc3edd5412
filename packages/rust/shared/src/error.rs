//! Error types for Hibou.
//!
//! Library crates use [`HibouError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Hibou operations.
#[derive(Debug, thiserror::Error)]
pub enum HibouError {
    /// One or more requested models are not in the fetched catalog.
    #[error("unknown model(s) requested: {}", models.join(", "))]
    UnknownModel { models: Vec<String> },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the knowledge platform.
    #[error("network error: {0}")]
    Network(String),

    /// Payload decoding error (JSON, JSONL, gzip).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed ontology, bad identifiers, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HibouError>;

impl HibouError {
    /// Create an unknown-model error for the given identifiers.
    pub fn unknown_models(models: Vec<String>) -> Self {
        Self::UnknownModel { models }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
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
