//! Queue snapshot store port (driven/secondary port)
//!
//! Persistence boundary for the durable operation queue. The queue writes
//! its full task list through this port on every mutation, before the
//! mutating call returns, so a crash between mutation and persistence is
//! never observable as a state change.

use async_trait::async_trait;

use crate::domain::SyncTask;

/// Port trait for persisting the operation-queue snapshot
#[async_trait]
pub trait IQueueStore: Send + Sync {
    /// Loads the persisted snapshot
    ///
    /// Returns an empty list when no snapshot exists yet.
    async fn load(&self) -> anyhow::Result<Vec<SyncTask>>;

    /// Atomically replaces the persisted snapshot with `tasks`
    ///
    /// Implementations must make the write atomic (e.g. temp file + rename)
    /// so a crash mid-write leaves the previous snapshot intact.
    async fn persist(&self, tasks: &[SyncTask]) -> anyhow::Result<()>;
}
