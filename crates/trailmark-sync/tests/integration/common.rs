//! Shared test doubles for sync cycle integration tests
//!
//! Provides an in-memory local store and a scriptable remote service.
//! The remote records every call it receives so tests can assert on call
//! order, and failures can be queued up to be returned one per call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use trailmark_cache::ExpiringCache;
use trailmark_core::domain::{EntityId, EntityType, RemoteError, RemoteId, SyncTask};
use trailmark_core::ports::{ILocalStore, ILocalTransaction, IRemoteService, RemotePage};
use trailmark_queue::{MemoryQueueStore, OperationQueue};
use trailmark_sync::SyncEngine;

/// In-memory local store double
///
/// Reports scripted unsynced counts per entity type and records every
/// payload saved through it.
#[derive(Default)]
pub struct MemoryStore {
    unsynced: Mutex<HashMap<EntityType, u64>>,
    saved: Mutex<Vec<(EntityType, EntityId, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `count` records of `entity_type` as lacking a remote identity
    pub fn set_unsynced(&self, entity_type: EntityType, count: u64) {
        self.unsynced.lock().unwrap().insert(entity_type, count);
    }

    /// Payloads saved via `save_payload`, in call order
    pub fn saved_payloads(&self) -> Vec<(EntityType, EntityId, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ILocalStore for MemoryStore {
    async fn count_unsynced(&self, entity_type: EntityType) -> anyhow::Result<u64> {
        Ok(*self.unsynced.lock().unwrap().get(&entity_type).unwrap_or(&0))
    }

    async fn record_exists(&self, _entity_type: EntityType, _id: EntityId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn save_payload(
        &self,
        entity_type: EntityType,
        id: EntityId,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push((entity_type, id, bytes.to_vec()));
        Ok(())
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn ILocalTransaction>> {
        anyhow::bail!("transactions are not supported by this test double")
    }
}

/// Scriptable remote service double
///
/// Every mutating call is appended to an internal log as
/// `"<op>:<entity_type>:<entity_id>"`. Queued failures are returned one
/// per call, in FIFO order, before any scripted success.
pub struct FakeRemote {
    authenticated: AtomicBool,
    calls: Mutex<Vec<String>>,
    fail_next: Mutex<VecDeque<RemoteError>>,
    ids_issued: AtomicU64,
    download_body: Mutex<Vec<u8>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(VecDeque::new()),
            ids_issued: AtomicU64::new(0),
            download_body: Mutex::new(b"payload".to_vec()),
        }
    }

    pub fn unauthenticated() -> Self {
        let remote = Self::new();
        remote.authenticated.store(false, Ordering::Release);
        remote
    }

    /// Queues an error to be returned by the next remote call
    pub fn fail_next(&self, error: RemoteError) {
        self.fail_next.lock().unwrap().push_back(error);
    }

    /// Sets the bytes returned by `download_file`
    pub fn set_download_body(&self, bytes: &[u8]) {
        *self.download_body.lock().unwrap() = bytes.to_vec();
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose log line starts with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, op: &str, entity_type: EntityType, entity_id: EntityId) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{op}:{entity_type}:{entity_id}"));
    }

    fn take_failure(&self) -> Option<RemoteError> {
        self.fail_next.lock().unwrap().pop_front()
    }

    fn next_remote_id(&self) -> RemoteId {
        let n = self.ids_issued.fetch_add(1, Ordering::AcqRel) + 1;
        RemoteId::new(format!("r-{n}")).expect("non-empty")
    }
}

#[async_trait]
impl IRemoteService for FakeRemote {
    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    async fn create_record(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        _fields: &HashMap<String, String>,
    ) -> Result<RemoteId, RemoteError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.record("create", entity_type, entity_id);
        Ok(self.next_remote_id())
    }

    async fn update_record(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        _fields: &HashMap<String, String>,
    ) -> Result<(), RemoteError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.record("update", entity_type, entity_id);
        Ok(())
    }

    async fn delete_record(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<(), RemoteError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.record("delete", entity_type, entity_id);
        Ok(())
    }

    async fn upload_file(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<RemoteId, RemoteError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.record("upload", entity_type, entity_id);
        Ok(self.next_remote_id())
    }

    async fn download_file(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<Vec<u8>, RemoteError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.record("download", entity_type, entity_id);
        Ok(self.download_body.lock().unwrap().clone())
    }

    async fn fetch_page(
        &self,
        _entity_type: EntityType,
        _cursor: Option<String>,
        _limit: u32,
    ) -> Result<RemotePage, RemoteError> {
        Ok(RemotePage::default())
    }
}

/// Wires an engine over fresh doubles and an empty in-memory queue
pub fn setup_engine(
    store: Arc<MemoryStore>,
    remote: Arc<FakeRemote>,
) -> (SyncEngine, Arc<OperationQueue>) {
    let queue = Arc::new(OperationQueue::new(Arc::new(MemoryQueueStore::new()), 100));
    let cache = Arc::new(ExpiringCache::new(100, 1024 * 1024));
    let engine = SyncEngine::new(
        store,
        remote,
        queue.clone(),
        cache,
        Duration::from_secs(600),
    );
    (engine, queue)
}

/// Expected log line for a call against `task`'s target
pub fn call_line(op: &str, task: &SyncTask) -> String {
    format!("{op}:{}:{}", task.entity_type(), task.entity_id())
}
