//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid content id: {0}")]
    InvalidContentId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid keyspace name: {0}")]
    InvalidKeyspace(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
