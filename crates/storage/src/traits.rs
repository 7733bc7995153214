//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use pinfile_core::ContentId;
use std::path::Path;
use std::time::Duration;

/// A content-addressed store the registry writes through.
///
/// Implementations hold no per-file state the registry depends on: every
/// call is a single remote (or local) operation, and `put` of identical
/// bytes is expected to be harmless.
#[async_trait]
pub trait ContentBackend: Send + Sync + 'static {
    /// Store a local file's bytes and pin them, returning their identifier.
    async fn put(&self, path: &Path) -> StorageResult<ContentId>;

    /// Fetch content into `dest`.
    ///
    /// The whole fetch is bounded by `timeout`. On any failure `dest` is left
    /// untouched: bytes land in a sibling temp file that is only renamed
    /// into place once complete.
    async fn get(&self, content_id: &ContentId, dest: &Path, timeout: Duration)
    -> StorageResult<()>;

    /// Release this registry's pin. The backend may keep the bytes if other
    /// pins exist.
    async fn unpin(&self, content_id: &ContentId) -> StorageResult<()>;

    /// Get the name of this storage backend ("ipfs", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification (e.g., local filesystem).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
