//! Keyspace lifecycle.

use crate::error::MetadataResult;
use async_trait::async_trait;

/// Provisioning of the namespace that holds the `files` table.
#[async_trait]
pub trait KeyspaceRepo: Send + Sync {
    /// Create the keyspace and `files` table if they do not exist.
    async fn init_keyspace(&self) -> MetadataResult<()>;

    /// Remove the keyspace and every row in it.
    async fn drop_keyspace(&self) -> MetadataResult<()>;

    /// Name of the keyspace this store operates on.
    fn keyspace(&self) -> &str;
}
