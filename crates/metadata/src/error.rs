//! Metadata store error types.

use std::time::Duration;
use thiserror::Error;

/// Metadata store operation errors.
///
/// A missing row is never an error here: lookups return `None` and
/// conditional writes return `false`.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
