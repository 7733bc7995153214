//! File table repository trait.

use crate::error::MetadataResult;
use crate::models::FileRow;
use async_trait::async_trait;

/// Point operations against the `files` table.
///
/// Writes are compare-and-set per filename: concurrent callers racing on
/// the same name see exactly one `true`.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Insert a row unless one already exists for the filename.
    /// Returns whether the row was created.
    async fn insert_if_absent(&self, row: &FileRow) -> MetadataResult<bool>;

    /// Delete the row for a filename if present. Returns whether a row was removed.
    async fn delete_if_present(&self, filename: &str) -> MetadataResult<bool>;

    /// Overwrite the timestamp of an existing row. Returns whether a row was updated.
    async fn update_timestamp_if_present(
        &self,
        filename: &str,
        timestamp: &str,
    ) -> MetadataResult<bool>;

    /// Content identifier stored for a filename.
    async fn lookup_content_id(&self, filename: &str) -> MetadataResult<Option<String>>;

    /// Timestamp string stored for a filename.
    async fn lookup_timestamp(&self, filename: &str) -> MetadataResult<Option<String>>;

    /// Whether a row exists for a filename.
    async fn exists(&self, filename: &str) -> MetadataResult<bool>;
}
