//! Sync cycle engine
//!
//! The [`SyncEngine`] executes one synchronization cycle: it resolves the
//! entity-type order, validates dependencies per type, then drains the
//! operation queue for each type in turn, executing every task against the
//! remote service. File tasks are drained in prioritizer order.
//!
//! ## Failure Containment
//!
//! A single task failure never aborts the cycle: retriable failures go
//! back to the queue with backoff, unretriable ones fail terminally, and
//! the cycle carries on. The one exception is losing authentication
//! mid-cycle, which aborts the cycle and requeues the interrupted task
//! without a retry penalty.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use trailmark_core::domain::{
    EntityType, FileSyncCandidate, RemoteError, SyncError, SyncTask, TaskOperation, TaskStatus,
};
use trailmark_core::ports::{ILocalStore, IRemoteService};
use trailmark_cache::ExpiringCache;
use trailmark_queue::OperationQueue;

use crate::prioritizer;
use crate::resolver::DependencyResolver;

/// Summary of a completed synchronization cycle
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Tasks that finished successfully
    pub completed: u32,
    /// Tasks re-enqueued for retry after a transient failure
    pub retried: u32,
    /// Tasks that failed terminally
    pub failed: u32,
    /// Entity types skipped because a dependency was not met
    pub skipped_types: Vec<EntityType>,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
    /// Message of the most recent failure in this cycle, if any
    pub last_error: Option<String>,
}

/// Outcome of executing one task, for cycle control flow
enum TaskOutcome {
    Completed,
    Retried,
    Failed,
    /// Credentials vanished mid-cycle; the task was requeued untouched
    AuthLost,
}

/// Executes sync cycles against the local store and remote service
pub struct SyncEngine {
    store: Arc<dyn ILocalStore>,
    remote: Arc<dyn IRemoteService>,
    queue: Arc<OperationQueue>,
    cache: Arc<ExpiringCache<String>>,
    resolver: DependencyResolver,
    /// TTL for entries the engine writes to the cache
    cache_ttl: Duration,
}

impl SyncEngine {
    /// Creates an engine over the given collaborators
    pub fn new(
        store: Arc<dyn ILocalStore>,
        remote: Arc<dyn IRemoteService>,
        queue: Arc<OperationQueue>,
        cache: Arc<ExpiringCache<String>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            queue,
            cache,
            resolver: DependencyResolver::new(),
            cache_ttl,
        }
    }

    /// Runs one sync cycle
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthenticationRequired`] when no credential is
    /// available; the caller is expected to skip silently.
    pub async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        if !self.remote.is_authenticated().await {
            return Err(SyncError::AuthenticationRequired);
        }

        let started = Instant::now();
        let mut report = SyncReport::default();
        info!("Sync cycle starting");

        'types: for entity_type in self.resolver.resolve_order() {
            match self
                .resolver
                .validate_dependencies(self.store.as_ref(), entity_type)
                .await
            {
                Ok(()) => {}
                Err(err @ SyncError::DependencyNotMet { .. }) => {
                    info!(entity = %entity_type, "Skipping type: {err}");
                    report.skipped_types.push(entity_type);
                    continue;
                }
                Err(err) => {
                    warn!(entity = %entity_type, "Dependency validation failed: {err}");
                    report.last_error = Some(err.to_string());
                    report.skipped_types.push(entity_type);
                    continue;
                }
            }

            // File payloads drain in prioritizer order first
            if entity_type.is_file_bearing() {
                for candidate in self.file_candidates(entity_type).await {
                    let task = self
                        .queue
                        .dequeue_matching(|t| {
                            t.entity_type() == entity_type
                                && t.entity_id() == candidate.entity_id
                                && t.operation().is_file_transfer()
                        })
                        .await
                        .map_err(SyncError::Store)?;
                    let Some(task) = task else { continue };
                    if let TaskOutcome::AuthLost = self.execute(&mut report, task).await? {
                        break 'types;
                    }
                }
            }

            // Remaining (record) tasks for this type, in queue order
            loop {
                let task = self
                    .queue
                    .dequeue_matching(|t| {
                        t.entity_type() == entity_type && !t.operation().is_file_transfer()
                    })
                    .await
                    .map_err(SyncError::Store)?;
                let Some(task) = task else { break };
                if let TaskOutcome::AuthLost = self.execute(&mut report, task).await? {
                    break 'types;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            skipped = report.skipped_types.len(),
            duration_ms = report.duration_ms,
            "Sync cycle finished"
        );
        Ok(report)
    }

    /// Builds prioritized transfer candidates from pending file tasks
    async fn file_candidates(&self, entity_type: EntityType) -> Vec<FileSyncCandidate> {
        let now = Utc::now();
        let candidates: Vec<FileSyncCandidate> = self
            .queue
            .snapshot()
            .await
            .into_iter()
            .filter(|t| {
                t.entity_type() == entity_type
                    && t.operation().is_file_transfer()
                    && t.is_eligible_at(now)
            })
            .map(|t| {
                let size = t
                    .payload()
                    .get("file_size_bytes")
                    .and_then(|s| s.parse::<u64>().ok());
                let created = t
                    .payload()
                    .get("created_at")
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                FileSyncCandidate::new(t.entity_id(), entity_type, size, created)
            })
            .collect();
        prioritizer::prioritize(candidates)
    }

    /// Executes one dequeued task and records the outcome
    async fn execute(
        &self,
        report: &mut SyncReport,
        task: SyncTask,
    ) -> Result<TaskOutcome, SyncError> {
        let outcome = match self.perform(&task).await {
            Ok(()) => {
                self.queue
                    .mark_completed(task.id())
                    .await
                    .map_err(SyncError::Store)?;
                TaskOutcome::Completed
            }
            Err(RemoteError::Unauthorized) => {
                warn!(task_id = %task.id(), "Authentication lost mid-cycle, aborting");
                self.queue
                    .requeue(task.id())
                    .await
                    .map_err(SyncError::Store)?;
                report.last_error = Some(RemoteError::Unauthorized.to_string());
                TaskOutcome::AuthLost
            }
            Err(err) if err.is_retriable() => {
                let status = self
                    .queue
                    .mark_failed(task.id(), err.to_string())
                    .await
                    .map_err(SyncError::Store)?;
                report.last_error = Some(err.to_string());
                if status == TaskStatus::Failed {
                    TaskOutcome::Failed
                } else {
                    TaskOutcome::Retried
                }
            }
            Err(err) => {
                self.queue
                    .mark_failed_terminal(task.id(), err.to_string())
                    .await
                    .map_err(SyncError::Store)?;
                report.last_error = Some(err.to_string());
                TaskOutcome::Failed
            }
        };

        match outcome {
            TaskOutcome::Completed => report.completed += 1,
            TaskOutcome::Retried => report.retried += 1,
            TaskOutcome::Failed => report.failed += 1,
            TaskOutcome::AuthLost => {}
        }
        Ok(outcome)
    }

    /// Performs the remote I/O for one task
    async fn perform(&self, task: &SyncTask) -> Result<(), RemoteError> {
        let entity_type = task.entity_type();
        let entity_id = task.entity_id();

        match task.operation() {
            TaskOperation::Create => {
                let remote_id = self
                    .remote
                    .create_record(entity_type, entity_id, task.payload())
                    .await?;
                self.cache.put(
                    remote_id_key(entity_type, task),
                    remote_id.to_string(),
                    self.cache_ttl,
                );
                self.cache.put(
                    pushed_key(entity_type, task),
                    fields_fingerprint(task),
                    self.cache_ttl,
                );
                Ok(())
            }
            TaskOperation::Update => {
                // Skip the remote call when the exact same field state was
                // already pushed and is still fresh in the cache
                let fingerprint = fields_fingerprint(task);
                let key = pushed_key(entity_type, task);
                if self.cache.get(&key).as_deref() == Some(fingerprint.as_str()) {
                    debug!(task_id = %task.id(), "Fields unchanged since last push, skipping remote call");
                    return Ok(());
                }
                self.remote
                    .update_record(entity_type, entity_id, task.payload())
                    .await?;
                self.cache.put(key, fingerprint, self.cache_ttl);
                Ok(())
            }
            TaskOperation::Delete => {
                self.remote.delete_record(entity_type, entity_id).await?;
                self.cache
                    .invalidate_matching(&format!("{entity_type}:{entity_id}"));
                Ok(())
            }
            TaskOperation::FileUpload => {
                let remote_id = self.remote.upload_file(entity_type, entity_id).await?;
                self.cache.put(
                    remote_id_key(entity_type, task),
                    remote_id.to_string(),
                    self.cache_ttl,
                );
                Ok(())
            }
            TaskOperation::FileDownload => {
                let bytes = self.remote.download_file(entity_type, entity_id).await?;
                self.store
                    .save_payload(entity_type, entity_id, &bytes)
                    .await
                    .map_err(|e| {
                        warn!(task_id = %task.id(), "Failed to store downloaded payload: {e}");
                        // Local write failures are transient from the
                        // task's point of view (e.g. disk pressure)
                        RemoteError::NetworkUnavailable
                    })?;
                Ok(())
            }
        }
    }
}

/// Cache key holding the remote identity of a record
fn remote_id_key(entity_type: EntityType, task: &SyncTask) -> String {
    format!("{entity_type}:{}:remote_id", task.entity_id())
}

/// Cache key holding the last successfully pushed field state
fn pushed_key(entity_type: EntityType, task: &SyncTask) -> String {
    format!("{entity_type}:{}:pushed", task.entity_id())
}

/// Deterministic serialization of the task's payload fields
fn fields_fingerprint(task: &SyncTask) -> String {
    let sorted: BTreeMap<&String, &String> = task.payload().iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}
