//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a status that is neither success nor "not modified".
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload parsed but does not have the expected shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage backend failure that is not a database error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A refresh failed and there is no persisted snapshot to fall back to.
    #[error("Denylist unavailable: {0}")]
    NoSnapshot(String),
}

impl Error {
    /// Whether this error belongs to the network class (fetch failure or bad status).
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::HttpStatus(_))
    }

    /// Whether this error belongs to the parse class (malformed payload).
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Json(_) | Self::InvalidPayload(_))
    }

    /// Whether this error belongs to the storage class.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
