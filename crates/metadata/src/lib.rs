//! Metadata table abstraction and implementations for pinfile.
//!
//! This crate owns the single `files(filename, timestamp, ipfs_cid)` table
//! that maps a caller-chosen filename to a content identifier. All writes
//! are conditional (insert-if-absent, delete-if-present,
//! update-if-present) and report whether they applied.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
mod queries;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use memory::MemoryStore;
pub use models::FileRow;
pub use postgres::PostgresStore;
pub use repos::{FileRepo, KeyspaceRepo};
pub use store::{MetadataStore, SqliteStore};

use pinfile_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store for `keyspace` from configuration.
///
/// The keyspace and its table are created if missing.
pub async fn from_config(
    config: &MetadataConfig,
    keyspace: &str,
) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;
    let session_timeout = config.session_timeout();

    match config {
        MetadataConfig::Sqlite { path, .. } => {
            let store = SqliteStore::new(path, keyspace, session_timeout).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            ..
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence over individual fields
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, keyspace, *max_connections, session_timeout).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    keyspace,
                    *max_connections,
                    session_timeout,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
