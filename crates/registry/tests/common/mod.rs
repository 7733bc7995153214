pub mod mocks;

#[allow(unused_imports)]
pub use mocks::{EventLog, FaultyStore, Op, RecordingBackend};

use pinfile_registry::FileRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_KEYSPACE: &str = "ipfs_files_test";

/// A registry wired to instrumented in-memory collaborators.
#[allow(dead_code)]
pub struct Harness {
    pub registry: FileRegistry,
    pub store: Arc<FaultyStore>,
    pub backend: Arc<RecordingBackend>,
    pub events: EventLog,
    pub dir: TempDir,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let events = EventLog::default();
        let store = Arc::new(FaultyStore::new(TEST_KEYSPACE, events.clone()));
        let backend = Arc::new(RecordingBackend::new(events.clone()));
        let registry = FileRegistry::new(store.clone(), backend.clone());
        Self {
            registry,
            store,
            backend,
            events,
            dir: TempDir::new().unwrap(),
        }
    }

    /// Write a local source file for uploads.
    pub async fn write_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, data).await.unwrap();
        path
    }

    /// Destination path for downloads.
    pub fn dest(&self, name: &str) -> PathBuf {
        self.dir.path().join("out").join(name)
    }
}
