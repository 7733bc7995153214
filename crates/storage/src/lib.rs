//! Content-addressed storage backends for pinfile.
//!
//! This crate provides:
//! - The `ContentBackend` trait: put a file, get by content id, unpin
//! - An IPFS backend (daemon for reads, cluster for writes and unpins)
//! - A local filesystem backend addressed by SHA-256
//! - Timed, all-or-nothing downloads that never leave partial files

pub mod backends;
pub mod error;
mod fetch;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, ipfs::IpfsBackend};
pub use error::{StorageError, StorageResult};
pub use traits::ContentBackend;

use pinfile_core::config::ContentConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a content backend from configuration.
pub async fn from_config(config: &ContentConfig) -> StorageResult<Arc<dyn ContentBackend>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        ContentConfig::Ipfs {
            host,
            port,
            cluster_host,
            cluster_port,
            pin,
            request_timeout_secs,
        } => {
            let backend = IpfsBackend::new(
                host,
                *port,
                cluster_host.as_deref(),
                *cluster_port,
                pin.clone(),
            )?
            .with_request_timeout(Duration::from_secs(*request_timeout_secs));
            Ok(Arc::new(backend))
        }
        ContentConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
