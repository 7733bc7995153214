//! In-memory metadata store.
//!
//! Holds the same compare-and-set contract as the SQL stores: every
//! conditional write goes through the map's per-shard entry lock, so racing
//! writers on one filename observe exactly one success.

use crate::error::MetadataResult;
use crate::models::FileRow;
use crate::repos::{FileRepo, KeyspaceRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Metadata store backed by a concurrent hash map.
pub struct MemoryStore {
    keyspace: String,
    rows: DashMap<String, FileRow>,
}

impl MemoryStore {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            rows: DashMap::new(),
        }
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of the row for a filename.
    pub fn row(&self, filename: &str) -> Option<FileRow> {
        self.rows.get(filename).map(|r| r.value().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(pinfile_core::DEFAULT_KEYSPACE)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl KeyspaceRepo for MemoryStore {
    async fn init_keyspace(&self) -> MetadataResult<()> {
        Ok(())
    }

    async fn drop_keyspace(&self) -> MetadataResult<()> {
        self.rows.clear();
        Ok(())
    }

    fn keyspace(&self) -> &str {
        &self.keyspace
    }
}

#[async_trait]
impl FileRepo for MemoryStore {
    async fn insert_if_absent(&self, row: &FileRow) -> MetadataResult<bool> {
        match self.rows.entry(row.filename.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                Ok(true)
            }
        }
    }

    async fn delete_if_present(&self, filename: &str) -> MetadataResult<bool> {
        Ok(self.rows.remove(filename).is_some())
    }

    async fn update_timestamp_if_present(
        &self,
        filename: &str,
        timestamp: &str,
    ) -> MetadataResult<bool> {
        match self.rows.get_mut(filename) {
            Some(mut row) => {
                row.timestamp = timestamp.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn lookup_content_id(&self, filename: &str) -> MetadataResult<Option<String>> {
        Ok(self.rows.get(filename).map(|r| r.ipfs_cid.clone()))
    }

    async fn lookup_timestamp(&self, filename: &str) -> MetadataResult<Option<String>> {
        Ok(self.rows.get(filename).map(|r| r.timestamp.clone()))
    }

    async fn exists(&self, filename: &str) -> MetadataResult<bool> {
        Ok(self.rows.contains_key(filename))
    }
}
