//! The file registry.
//!
//! Maps filenames to content ids through a conditional-write metadata table.
//! Content is always written before metadata is inserted, and metadata is
//! always removed before content is unpinned. A crash between the two steps
//! leaves unreferenced content behind, never a row pointing at nothing.

use crate::error::{RegistryError, RegistryResult};
use pinfile_core::config::RegistryConfig;
use pinfile_core::{ContentId, FileRecord, Timestamp, TimestampPolicy};
use pinfile_metadata::{FileRow, MetadataStore};
use pinfile_storage::ContentBackend;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Tunables for registry operations.
#[derive(Clone, Copy, Debug)]
pub struct RegistryOptions {
    /// Upper bound on a single content fetch.
    pub fetch_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(pinfile_core::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl From<&RegistryConfig> for RegistryOptions {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

/// Result of a write that inserts a row (upload or link).
#[derive(Clone, Debug, PartialEq)]
pub struct WriteOutcome {
    /// Content written or referenced by this call. When `applied` is false
    /// the name keeps its previous content and this id is not referenced by
    /// the call's row.
    pub content_id: ContentId,
    /// Timestamp this call tried to record.
    pub timestamp: Timestamp,
    /// Whether this call created the row.
    pub applied: bool,
}

/// Result of a delete.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteOutcome {
    /// Content the name referenced when the delete started.
    pub content_id: ContentId,
    /// Whether this call removed the row. False when a concurrent delete won.
    pub applied: bool,
    /// Whether the content backend confirmed the unpin.
    pub unpinned: bool,
}

/// Filename to content registry over a metadata store and a content backend.
#[derive(Clone)]
pub struct FileRegistry {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentBackend>,
    options: RegistryOptions,
}

impl FileRegistry {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: Arc<dyn ContentBackend>) -> Self {
        Self::with_options(metadata, content, RegistryOptions::default())
    }

    pub fn with_options(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentBackend>,
        options: RegistryOptions,
    ) -> Self {
        Self {
            metadata,
            content,
            options,
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn content(&self) -> &Arc<dyn ContentBackend> {
        &self.content
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Keyspace the metadata store is bound to.
    pub fn keyspace(&self) -> &str {
        self.metadata.keyspace()
    }

    /// Store a local file and register it under `filename`.
    ///
    /// A missing or non-finite `timestamp` records the current time. If the
    /// name is already taken the upload is a no-op on metadata
    /// (`applied == false`) and the freshly stored content stays unreferenced.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload(
        &self,
        path: &Path,
        filename: &str,
        timestamp: Option<f64>,
    ) -> RegistryResult<WriteOutcome> {
        let timestamp = timestamp
            .and_then(|secs| Timestamp::new(secs).ok())
            .unwrap_or_else(Timestamp::now);

        let content_id =
            self.content
                .put(path)
                .await
                .map_err(|source| RegistryError::ContentPutFailed {
                    path: path.to_path_buf(),
                    source,
                })?;

        let record = FileRecord {
            filename: filename.to_string(),
            content_id,
            timestamp,
        };
        let applied = self.insert_record("upload", &record).await?;
        if applied {
            info!(content_id = %record.content_id, %timestamp, "File registered");
        } else {
            info!(
                content_id = %record.content_id,
                "Filename already registered, uploaded content left unreferenced"
            );
        }

        Ok(WriteOutcome {
            content_id: record.content_id,
            timestamp,
            applied,
        })
    }

    /// Write the bytes registered under `filename` to `dest`.
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    pub async fn download(&self, filename: &str, dest: &Path) -> RegistryResult<ContentId> {
        let content_id = self.require_content_id("download", filename).await?;

        self.content
            .get(&content_id, dest, self.options.fetch_timeout)
            .await
            .map_err(|source| RegistryError::FileDownloadFailed {
                filename: filename.to_string(),
                content_id: content_id.clone(),
                dest: dest.to_path_buf(),
                source,
            })?;

        debug!(%content_id, "File downloaded");
        Ok(content_id)
    }

    /// Register `dst` as another name for the content behind `src`.
    ///
    /// No bytes move. `dst` keeps its previous content if it already exists.
    #[instrument(skip(self))]
    pub async fn link(
        &self,
        src: &str,
        dst: &str,
        policy: TimestampPolicy,
    ) -> RegistryResult<WriteOutcome> {
        let timestamp = match policy {
            TimestampPolicy::Now => Timestamp::now(),
            TimestampPolicy::Explicit(timestamp) => timestamp,
            TimestampPolicy::CopySource => self
                .lookup_timestamp("link", src)
                .await?
                .ok_or_else(|| RegistryError::FileNotFound {
                    filename: src.to_string(),
                })?,
        };

        let content_id = self.require_content_id("link", src).await?;
        let record = FileRecord {
            filename: dst.to_string(),
            content_id,
            timestamp,
        };
        let applied = self.insert_record("link", &record).await?;
        if applied {
            info!(content_id = %record.content_id, %timestamp, "Link registered");
        } else {
            debug!("Link target already registered");
        }

        Ok(WriteOutcome {
            content_id: record.content_id,
            timestamp,
            applied,
        })
    }

    /// Remove `filename` and then unpin its content.
    ///
    /// The unpin is best effort: a failure is logged and reported through
    /// [`DeleteOutcome::unpinned`]. The content is not reference counted, so
    /// other names sharing it are left dangling.
    #[instrument(skip(self))]
    pub async fn delete(&self, filename: &str) -> RegistryResult<DeleteOutcome> {
        let content_id = self.require_content_id("delete", filename).await?;

        let applied = self
            .metadata
            .delete_if_present(filename)
            .await
            .map_err(|source| RegistryError::MetadataMutationFailed {
                operation: "delete",
                key: filename.to_string(),
                pending: None,
                source,
            })?;

        if !applied {
            debug!(%content_id, "Row already removed by a concurrent delete");
            return Ok(DeleteOutcome {
                content_id,
                applied,
                unpinned: false,
            });
        }

        let unpinned = match self.content.unpin(&content_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%content_id, error = %e, "Failed to unpin deleted content");
                false
            }
        };
        info!(%content_id, unpinned, "File deleted");

        Ok(DeleteOutcome {
            content_id,
            applied,
            unpinned,
        })
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, filename: &str) -> RegistryResult<bool> {
        self.metadata
            .exists(filename)
            .await
            .map_err(|source| RegistryError::MetadataQueryFailed {
                operation: "exists",
                key: filename.to_string(),
                source,
            })
    }

    /// Stored timestamp of `filename`, or `None` if it is not registered.
    #[instrument(skip(self))]
    pub async fn get_timestamp(&self, filename: &str) -> RegistryResult<Option<Timestamp>> {
        self.lookup_timestamp("get_timestamp", filename).await
    }

    /// Set the timestamp of an existing file to now.
    ///
    /// Returns false, and creates nothing, if the file is not registered.
    #[instrument(skip(self))]
    pub async fn update_timestamp(&self, filename: &str) -> RegistryResult<bool> {
        let timestamp = Timestamp::now();
        let applied = self
            .metadata
            .update_timestamp_if_present(filename, &timestamp.to_db_string())
            .await
            .map_err(|source| RegistryError::MetadataMutationFailed {
                operation: "update_timestamp",
                key: filename.to_string(),
                pending: None,
                source,
            })?;
        debug!(applied, %timestamp, "Timestamp update");
        Ok(applied)
    }

    /// Content id registered under `filename`, or `None`.
    #[instrument(skip(self))]
    pub async fn content_id(&self, filename: &str) -> RegistryResult<Option<ContentId>> {
        self.lookup_content_id("content_id", filename).await
    }

    /// Insert an already-stored record if the name is free.
    ///
    /// Completes an upload whose metadata insert failed, using the record
    /// carried by [`RegistryError::MetadataMutationFailed`].
    #[instrument(skip(self, record), fields(filename = %record.filename))]
    pub async fn index(&self, record: &FileRecord) -> RegistryResult<WriteOutcome> {
        let applied = self.insert_record("index", record).await?;
        Ok(WriteOutcome {
            content_id: record.content_id.clone(),
            timestamp: record.timestamp,
            applied,
        })
    }

    /// Check both the metadata store and the content backend.
    pub async fn health_check(&self) -> RegistryResult<()> {
        self.metadata
            .health_check()
            .await
            .map_err(RegistryError::MetadataUnavailable)?;
        self.content
            .health_check()
            .await
            .map_err(RegistryError::ContentUnavailable)?;
        Ok(())
    }

    /// Create the keyspace and its table if missing.
    pub async fn init_keyspace(&self) -> RegistryResult<()> {
        self.metadata
            .init_keyspace()
            .await
            .map_err(|source| self.keyspace_error("init_keyspace", source))?;
        info!(keyspace = self.keyspace(), "Keyspace ready");
        Ok(())
    }

    /// Drop the keyspace and every row in it. Content is not unpinned.
    pub async fn drop_keyspace(&self) -> RegistryResult<()> {
        self.metadata
            .drop_keyspace()
            .await
            .map_err(|source| self.keyspace_error("drop_keyspace", source))?;
        warn!(keyspace = self.keyspace(), "Keyspace dropped");
        Ok(())
    }

    async fn insert_record(
        &self,
        operation: &'static str,
        record: &FileRecord,
    ) -> RegistryResult<bool> {
        let row = FileRow::new(
            record.filename.as_str(),
            record.content_id.as_str(),
            record.timestamp.to_db_string(),
        );
        self.metadata
            .insert_if_absent(&row)
            .await
            .map_err(|source| RegistryError::MetadataMutationFailed {
                operation,
                key: record.filename.clone(),
                pending: Some(record.clone()),
                source,
            })
    }

    async fn require_content_id(
        &self,
        operation: &'static str,
        filename: &str,
    ) -> RegistryResult<ContentId> {
        self.lookup_content_id(operation, filename)
            .await?
            .ok_or_else(|| RegistryError::FileNotFound {
                filename: filename.to_string(),
            })
    }

    async fn lookup_content_id(
        &self,
        operation: &'static str,
        filename: &str,
    ) -> RegistryResult<Option<ContentId>> {
        let value = self
            .metadata
            .lookup_content_id(filename)
            .await
            .map_err(|source| RegistryError::MetadataQueryFailed {
                operation,
                key: filename.to_string(),
                source,
            })?;

        value
            .map(|raw| {
                ContentId::new(raw.as_str()).map_err(|_| RegistryError::CorruptRecord {
                    filename: filename.to_string(),
                    field: "ipfs_cid",
                    value: raw,
                })
            })
            .transpose()
    }

    async fn lookup_timestamp(
        &self,
        operation: &'static str,
        filename: &str,
    ) -> RegistryResult<Option<Timestamp>> {
        let value = self
            .metadata
            .lookup_timestamp(filename)
            .await
            .map_err(|source| RegistryError::MetadataQueryFailed {
                operation,
                key: filename.to_string(),
                source,
            })?;

        value
            .map(|raw| {
                Timestamp::parse(&raw).map_err(|_| RegistryError::CorruptRecord {
                    filename: filename.to_string(),
                    field: "timestamp",
                    value: raw,
                })
            })
            .transpose()
    }

    fn keyspace_error(
        &self,
        operation: &'static str,
        source: pinfile_metadata::MetadataError,
    ) -> RegistryError {
        RegistryError::MetadataMutationFailed {
            operation,
            key: self.keyspace().to_string(),
            pending: None,
            source,
        }
    }
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("keyspace", &self.keyspace())
            .field("metadata", &self.metadata.backend_name())
            .field("content", &self.content.backend_name())
            .field("options", &self.options)
            .finish()
    }
}
