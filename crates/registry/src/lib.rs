//! Content-addressed file registry.
//!
//! [`FileRegistry`] keeps a `filename -> (content id, timestamp)` table in a
//! metadata store and the bytes in a content backend. Writes go through
//! compare-and-set so concurrent callers racing on one name see exactly one
//! winner.

pub mod error;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::{DeleteOutcome, FileRegistry, RegistryOptions, WriteOutcome};

use pinfile_core::config::AppConfig;
use tracing::info;

/// Build a registry from application configuration.
///
/// Connects to the metadata store (creating the resolved keyspace if it is
/// missing) and to the content backend.
pub async fn from_config(config: &AppConfig) -> RegistryResult<FileRegistry> {
    config.validate().map_err(RegistryError::Config)?;

    let keyspace = config.keyspace.resolved_name();
    let metadata = pinfile_metadata::from_config(&config.metadata, &keyspace)
        .await
        .map_err(RegistryError::MetadataUnavailable)?;
    let content = pinfile_storage::from_config(&config.content)
        .await
        .map_err(RegistryError::ContentUnavailable)?;

    info!(
        keyspace = %keyspace,
        metadata = metadata.backend_name(),
        content = content.backend_name(),
        "File registry initialized"
    );

    Ok(FileRegistry::with_options(
        metadata,
        content,
        RegistryOptions::from(&config.registry),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinfile_core::config::{ContentConfig, KeyspaceConfig, MetadataConfig};

    #[tokio::test]
    async fn builds_local_registry_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            keyspace: KeyspaceConfig::new("ipfs_files", "test"),
            metadata: MetadataConfig::Sqlite {
                path: dir.path().join("meta"),
                session_timeout_secs: 5,
            },
            content: ContentConfig::Filesystem {
                path: dir.path().join("blobs"),
            },
            ..AppConfig::default()
        };

        let registry = from_config(&config).await.unwrap();
        assert_eq!(registry.keyspace(), "ipfs_files_test");
        assert!(dir.path().join("meta").join("ipfs_files_test.db").exists());
        registry.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_keyspace() {
        let config = AppConfig {
            keyspace: KeyspaceConfig::new("Bad-Name", ""),
            ..AppConfig::default()
        };
        let err = from_config(&config).await.unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }
}
