use async_trait::async_trait;
use pinfile_core::{ContentHash, ContentId};
use pinfile_metadata::error::{MetadataError, MetadataResult};
use pinfile_metadata::{FileRepo, FileRow, KeyspaceRepo, MemoryStore, MetadataStore};
use pinfile_storage::error::{StorageError, StorageResult};
use pinfile_storage::traits::ContentBackend;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of calls made against the mocks, shared between the
/// metadata store and the content backend.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<&'static str>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn record(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// In-memory content backend that counts calls and can be told to fail.
///
/// Content ids are `Qm` followed by the SHA-256 of the bytes unless an id is
/// queued with [`RecordingBackend::queue_id`].
#[allow(dead_code)]
pub struct RecordingBackend {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    next_ids: Mutex<VecDeque<String>>,
    unpinned: Mutex<Vec<String>>,
    events: EventLog,
    pub put_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub unpin_calls: AtomicUsize,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_unpin: AtomicBool,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn new(events: EventLog) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            next_ids: Mutex::new(VecDeque::new()),
            unpinned: Mutex::new(Vec::new()),
            events,
            put_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            unpin_calls: AtomicUsize::new(0),
            fail_put: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_unpin: AtomicBool::new(false),
        }
    }

    /// Use `id` for the next stored object instead of the derived one.
    pub fn queue_id(&self, id: &str) {
        self.next_ids.lock().unwrap().push_back(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Ids passed to successful unpins, in call order.
    pub fn unpinned(&self) -> Vec<String> {
        self.unpinned.lock().unwrap().clone()
    }

    pub fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn unpins(&self) -> usize {
        self.unpin_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentBackend for RecordingBackend {
    async fn put(&self, path: &Path) -> StorageResult<ContentId> {
        self.events.record("put");
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::Api {
                status: 500,
                body: "injected put failure".to_string(),
            });
        }

        let data = tokio::fs::read(path).await?;
        let queued = self.next_ids.lock().unwrap().pop_front();
        let id = queued.unwrap_or_else(|| format!("Qm{}", ContentHash::compute(&data).to_hex()));
        let content_id =
            ContentId::new(id.as_str()).map_err(|e| StorageError::InvalidContentId(e.to_string()))?;
        self.objects.lock().unwrap().insert(id, data);
        Ok(content_id)
    }

    async fn get(
        &self,
        content_id: &ContentId,
        dest: &Path,
        timeout: Duration,
    ) -> StorageResult<()> {
        self.events.record("get");
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StorageError::Timeout { after: timeout });
        }

        let data = self
            .objects
            .lock()
            .unwrap()
            .get(content_id.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(content_id.to_string()))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, data).await?;
        Ok(())
    }

    async fn unpin(&self, content_id: &ContentId) -> StorageResult<()> {
        self.events.record("unpin");
        self.unpin_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_unpin.load(Ordering::SeqCst) {
            return Err(StorageError::Api {
                status: 503,
                body: "injected unpin failure".to_string(),
            });
        }

        let removed = self.objects.lock().unwrap().remove(content_id.as_str());
        match removed {
            Some(_) => {
                self.unpinned
                    .lock()
                    .unwrap()
                    .push(content_id.as_str().to_string());
                Ok(())
            }
            None => Err(StorageError::NotFound(content_id.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Metadata operations that [`FaultyStore`] can fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Insert,
    Delete,
    UpdateTimestamp,
    LookupContentId,
    LookupTimestamp,
    Exists,
    InitKeyspace,
    DropKeyspace,
}

impl Op {
    fn event(self) -> &'static str {
        match self {
            Op::Insert => "insert_if_absent",
            Op::Delete => "delete_if_present",
            Op::UpdateTimestamp => "update_timestamp_if_present",
            Op::LookupContentId => "lookup_content_id",
            Op::LookupTimestamp => "lookup_timestamp",
            Op::Exists => "exists",
            Op::InitKeyspace => "init_keyspace",
            Op::DropKeyspace => "drop_keyspace",
        }
    }
}

/// Wraps [`MemoryStore`] with per-operation failure injection.
///
/// A failing operation returns before touching the wrapped store, the way a
/// timed-out request would.
#[allow(dead_code)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<Op>>,
    calls: Mutex<HashMap<Op, usize>>,
    events: EventLog,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new(keyspace: &str, events: EventLog) -> Self {
        Self {
            inner: MemoryStore::new(keyspace),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    fn enter(&self, op: Op) -> MetadataResult<()> {
        self.events.record(op.event());
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(&op) {
            return Err(MetadataError::Unavailable(format!(
                "injected {} failure",
                op.event()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FileRepo for FaultyStore {
    async fn insert_if_absent(&self, row: &FileRow) -> MetadataResult<bool> {
        self.enter(Op::Insert)?;
        self.inner.insert_if_absent(row).await
    }

    async fn delete_if_present(&self, filename: &str) -> MetadataResult<bool> {
        self.enter(Op::Delete)?;
        self.inner.delete_if_present(filename).await
    }

    async fn update_timestamp_if_present(
        &self,
        filename: &str,
        timestamp: &str,
    ) -> MetadataResult<bool> {
        self.enter(Op::UpdateTimestamp)?;
        self.inner
            .update_timestamp_if_present(filename, timestamp)
            .await
    }

    async fn lookup_content_id(&self, filename: &str) -> MetadataResult<Option<String>> {
        self.enter(Op::LookupContentId)?;
        self.inner.lookup_content_id(filename).await
    }

    async fn lookup_timestamp(&self, filename: &str) -> MetadataResult<Option<String>> {
        self.enter(Op::LookupTimestamp)?;
        self.inner.lookup_timestamp(filename).await
    }

    async fn exists(&self, filename: &str) -> MetadataResult<bool> {
        self.enter(Op::Exists)?;
        self.inner.exists(filename).await
    }
}

#[async_trait]
impl KeyspaceRepo for FaultyStore {
    async fn init_keyspace(&self) -> MetadataResult<()> {
        self.enter(Op::InitKeyspace)?;
        self.inner.init_keyspace().await
    }

    async fn drop_keyspace(&self) -> MetadataResult<()> {
        self.enter(Op::DropKeyspace)?;
        self.inner.drop_keyspace().await
    }

    fn keyspace(&self) -> &str {
        self.inner.keyspace()
    }
}

#[async_trait]
impl MetadataStore for FaultyStore {
    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }
}
