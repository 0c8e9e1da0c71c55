//! Error types for the hydrator
//!
//! Provides unified error handling using thiserror. None of these ever reach
//! a hydration caller: every public scheduling path collapses them to an
//! absent value.

use thiserror::Error;

// == Hydrate Error Enum ==
/// Unified error type for lookups, storage and configuration.
#[derive(Error, Debug)]
pub enum HydrateError {
    /// Transport-level failure talking to the backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Unexpected status {status} for key: {key}")]
    Status { key: String, status: u16 },

    /// Lookup exceeded its deadline
    #[error("Lookup timed out: {0}")]
    Timeout(String),

    /// Payload could not be parsed as JSON
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload parsed but carried no usable photo field
    #[error("No photo field for key: {0}")]
    MissingField(String),

    /// Backing storage rejected an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backing storage is out of space
    #[error("Storage quota exceeded: {used} + {requested} > {quota} bytes")]
    QuotaExceeded {
        used: usize,
        requested: usize,
        quota: usize,
    },

    /// Entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration values are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fetch queue no longer accepts work
    #[error("Fetch queue closed")]
    QueueClosed,
}

// == Result Type Alias ==
/// Convenience Result type for the hydrator.
pub type Result<T> = std::result::Result<T, HydrateError>;
