//! Queue snapshot stores
//!
//! Two implementations of the [`IQueueStore`] port:
//!
//! - [`JsonQueueStore`] - the production store, one JSON file written
//!   atomically (temp file + rename) on every queue mutation
//! - [`MemoryQueueStore`] - an in-memory store for tests

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use trailmark_core::domain::SyncTask;
use trailmark_core::ports::IQueueStore;

/// JSON-file snapshot store
///
/// The snapshot is the full serialized task list. Writes go to a sibling
/// temp file first and are renamed into place, so a crash mid-write leaves
/// the previous snapshot intact.
pub struct JsonQueueStore {
    path: PathBuf,
}

impl JsonQueueStore {
    /// Creates a store backed by the file at `path`, creating parent
    /// directories if needed
    pub fn new(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl IQueueStore for JsonQueueStore {
    async fn load(&self) -> anyhow::Result<Vec<SyncTask>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let tasks: Vec<SyncTask> = serde_json::from_str(&content)?;
        tracing::debug!(count = tasks.len(), path = %self.path.display(), "Loaded queue snapshot");
        Ok(tasks)
    }

    async fn persist(&self, tasks: &[SyncTask]) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(tasks)?;

        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::trace!(count = tasks.len(), "Persisted queue snapshot");
        Ok(())
    }
}

/// In-memory snapshot store for tests
///
/// Keeps the last persisted snapshot so tests can assert on exactly what
/// would have hit disk.
#[derive(Default)]
pub struct MemoryQueueStore {
    tasks: Mutex<Vec<SyncTask>>,
}

impl MemoryQueueStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with tasks, as if loaded from disk
    pub fn with_tasks(tasks: Vec<SyncTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
        }
    }

    /// Returns a copy of the last persisted snapshot
    pub fn persisted(&self) -> Vec<SyncTask> {
        self.tasks.lock().expect("store lock poisoned").clone()
    }
}

#[async_trait]
impl IQueueStore for MemoryQueueStore {
    async fn load(&self) -> anyhow::Result<Vec<SyncTask>> {
        Ok(self.tasks.lock().expect("store lock poisoned").clone())
    }

    async fn persist(&self, tasks: &[SyncTask]) -> anyhow::Result<()> {
        *self.tasks.lock().expect("store lock poisoned") = tasks.to_vec();
        Ok(())
    }
}
