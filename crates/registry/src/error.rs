//! Registry error types.
//!
//! Every variant names the operation step that failed, so a caller can tell
//! "content store failed" apart from "content stored, metadata insert
//! failed" and decide whether to retry.

use pinfile_core::{ContentId, FileRecord};
use pinfile_metadata::MetadataError;
use pinfile_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// File registry operation errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A read against the metadata table failed. Distinct from a missing row.
    #[error("metadata query {operation} failed for {key}: {source}")]
    MetadataQueryFailed {
        operation: &'static str,
        key: String,
        source: MetadataError,
    },

    /// A conditional write failed at the transport level (it did not merely
    /// lose the compare-and-set).
    ///
    /// `pending` is the row that was being written. For an upload its content
    /// is already stored, and re-submitting it through
    /// [`FileRegistry::index`](crate::FileRegistry::index) is safe.
    #[error("metadata mutation {operation} failed for {key}: {source}")]
    MetadataMutationFailed {
        operation: &'static str,
        key: String,
        pending: Option<FileRecord>,
        source: MetadataError,
    },

    #[error("file not found: {filename}")]
    FileNotFound { filename: String },

    /// The content backend rejected the upload; no metadata was written.
    #[error("failed to store {} in content backend: {source}", .path.display())]
    ContentPutFailed { path: PathBuf, source: StorageError },

    /// The content backend fetch failed or timed out; metadata is unchanged.
    #[error(
        "failed to download {filename} ({content_id}) to {}: {source}",
        .dest.display()
    )]
    FileDownloadFailed {
        filename: String,
        content_id: ContentId,
        dest: PathBuf,
        source: StorageError,
    },

    /// A stored value does not parse (written by a foreign client).
    #[error("corrupt {field} for {filename}: {value:?}")]
    CorruptRecord {
        filename: String,
        field: &'static str,
        value: String,
    },

    #[error("metadata store unavailable: {0}")]
    MetadataUnavailable(#[source] MetadataError),

    #[error("content backend unavailable: {0}")]
    ContentUnavailable(#[source] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// Content that is stored and pinned but not referenced by any row
    /// because the metadata insert failed.
    pub fn unindexed_content(&self) -> Option<&ContentId> {
        match self {
            RegistryError::MetadataMutationFailed {
                pending: Some(record),
                ..
            } => Some(&record.content_id),
            _ => None,
        }
    }

    /// Whether this is a plain "no such file" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::FileNotFound { .. })
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
