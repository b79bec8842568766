//! Error types for the talkai library.
//!
//! This module provides custom error types using `thiserror` for the repository,
//! configuration and vendor layers. The vendor glue itself never surfaces these
//! to callers; it converts them into outcome values.

use thiserror::Error;

/// Errors that can occur in the talkai application.
#[derive(Error, Debug)]
pub enum TalkAiError {
    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream service answered with a non-success status
    #[error("Upstream error ({status}): {body}")]
    Upstream {
        /// HTTP status code returned by the upstream service
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required credential or endpoint is not configured
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with TalkAiError
pub type Result<T> = std::result::Result<T, TalkAiError>;

impl From<anyhow::Error> for TalkAiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl TalkAiError {
    /// HTTP status code this error maps to when rendered by the API layer
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::NotConfigured(_) => 503,
            Self::Upstream { .. } | Self::Http(_) => 502,
            Self::Serialization(_) | Self::Config(_) | Self::Io(_) | Self::Other(_) => 500,
        }
    }
}
