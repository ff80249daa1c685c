//! Error types for director-core

use thiserror::Error;

/// Main error type for director-core
#[derive(Error, Debug)]
pub enum Error {
    /// No usable agent registry, or a malformed settings file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The classification service could not be reached or returned garbage
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Delegation error: {0}")]
    Delegation(String),

    /// Synchronous invocation was requested
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for director-core
pub type Result<T> = std::result::Result<T, Error>;
