//! Local filesystem content backend.
//!
//! Objects are addressed by the hex SHA-256 of their bytes and fanned out as
//! `<root>/ab/cd/<hex>`. A pin is the object file itself, so unpinning
//! removes it.

use crate::error::{StorageError, StorageResult};
use crate::fetch::{temp_path_for, write_atomically};
use crate::traits::ContentBackend;
use async_trait::async_trait;
use pinfile_core::{ContentHash, ContentId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;

/// Buffer size for hashing and copying (64 KiB).
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem content store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object path for a content id. Only well-formed hashes map to a path,
    /// so ids can never escape the root.
    fn object_path(&self, content_id: &ContentId) -> StorageResult<PathBuf> {
        let hash = ContentHash::from_hex(content_id.as_str())
            .map_err(|e| StorageError::InvalidContentId(e.to_string()))?;
        let hex = hash.to_hex();
        Ok(self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex))
    }
}

#[async_trait]
impl ContentBackend for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put(&self, path: &Path) -> StorageResult<ContentId> {
        let mut source = fs::File::open(path).await?;

        // Copy into a temp file inside the root while hashing, then move it
        // to its content address.
        let staging = temp_path_for(&self.root.join("incoming"));
        let mut hasher = ContentHash::hasher();
        let copied = async {
            let mut staged = fs::File::create(&staging).await?;
            let mut buf = vec![0u8; COPY_CHUNK_SIZE];
            loop {
                let n = source.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                staged.write_all(&buf[..n]).await?;
            }
            // Ensure data is flushed to disk before rename
            staged.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = copied {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::Io(e));
        }

        let content_id = ContentId::new(hasher.finalize().to_hex())
            .map_err(|e| StorageError::InvalidContentId(e.to_string()))?;
        let object = self.object_path(&content_id)?;
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Same hash, same bytes: replacing an existing object changes nothing.
        if let Err(e) = fs::rename(&staging, &object).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::Io(e));
        }

        tracing::debug!(content_id = %content_id, "Stored object");
        Ok(content_id)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(
        &self,
        content_id: &ContentId,
        dest: &Path,
        timeout: Duration,
    ) -> StorageResult<()> {
        let object = self.object_path(content_id)?;
        if !fs::try_exists(&object).await? {
            return Err(StorageError::NotFound(content_id.to_string()));
        }

        write_atomically(dest, timeout, |temp| async move {
            fs::copy(&object, &temp).await?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn unpin(&self, content_id: &ContentId) -> StorageResult<()> {
        let object = self.object_path(content_id)?;
        fs::remove_file(&object).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(content_id.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::Config(format!(
                "content root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}
