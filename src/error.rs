//! Error types for Engagement Flux

use thiserror::Error;

/// Errors reported by an event store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached (connectivity, credentials, poisoned lock)
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// A single read or write call failed
    #[error("Event store query failed: {0}")]
    QueryFailed(String),

    /// No events exist for the requested scope
    #[error("No events found for {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

/// Errors that can occur while parsing input, loading configuration or encoding reports
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
