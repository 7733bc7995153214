//! Storage error types.

use std::time::Duration;
use thiserror::Error;

/// Content backend operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("invalid content id: {0}")]
    InvalidContentId(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
