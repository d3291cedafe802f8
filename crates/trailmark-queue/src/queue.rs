//! The durable operation queue
//!
//! One [`OperationQueue`] instance is shared by every component that
//! produces or consumes sync work. A single `tokio::sync::Mutex` guards the
//! in-memory task list together with its persisted mirror: every
//! read-modify-write sequence stages its change on a copy, persists the
//! copy through the snapshot store, and only then publishes it, so
//! concurrent callers never observe state mid-mutation and a crash between
//! mutation and persistence is never observable as a state change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use trailmark_core::domain::{SyncTask, TaskId, TaskPriority, TaskStatus};
use trailmark_core::ports::IQueueStore;

/// Result of an enqueue attempt
///
/// Rejection is backpressure, not data loss: already-queued work is
/// untouched and the caller should retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The task was accepted and persisted
    Accepted(TaskId),
    /// The queue is at capacity
    Rejected,
}

impl EnqueueOutcome {
    /// Returns true if the task was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnqueueOutcome::Accepted(_))
    }
}

/// Point-in-time queue counters for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Task counts per lifecycle status
    pub by_status: HashMap<TaskStatus, usize>,
    /// Pending task counts per priority
    pub pending_by_priority: HashMap<TaskPriority, usize>,
}

/// The persisted, prioritized, retryable task queue
pub struct OperationQueue {
    /// In-memory task list; its persisted mirror is updated under the same lock
    tasks: Mutex<Vec<SyncTask>>,
    /// Snapshot persistence
    store: Arc<dyn IQueueStore>,
    /// Maximum number of tasks held at once
    capacity: usize,
}

impl OperationQueue {
    /// Loads the queue from its persisted snapshot
    ///
    /// Tasks left in-progress by a prior crash are requeued as pending with
    /// their retry count unchanged (at-least-once delivery), and the
    /// recovered snapshot is written back immediately.
    pub async fn load(store: Arc<dyn IQueueStore>, capacity: usize) -> anyhow::Result<Self> {
        let mut tasks = store.load().await?;

        let interrupted = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::InProgress)
            .count();
        if interrupted > 0 {
            warn!(
                count = interrupted,
                "Requeuing tasks interrupted by a prior crash"
            );
            tasks = tasks
                .into_iter()
                .map(|t| {
                    if t.status() == TaskStatus::InProgress {
                        t.requeued()
                    } else {
                        t
                    }
                })
                .collect();
            store.persist(&tasks).await?;
        }

        info!(count = tasks.len(), capacity, "Operation queue loaded");
        Ok(Self {
            tasks: Mutex::new(tasks),
            store,
            capacity,
        })
    }

    /// Creates an empty queue (no snapshot on disk yet)
    pub fn new(store: Arc<dyn IQueueStore>, capacity: usize) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            store,
            capacity,
        }
    }

    /// Adds a task to the queue
    ///
    /// Any existing task matching the same (entity type, entity id,
    /// operation) tuple is removed first; only the most recent request for
    /// a given operation on a given entity is kept. Returns
    /// [`EnqueueOutcome::Rejected`] when the queue is at capacity after
    /// coalescing.
    pub async fn enqueue(&self, task: SyncTask) -> anyhow::Result<EnqueueOutcome> {
        let mut guard = self.tasks.lock().await;
        let mut next: Vec<SyncTask> = guard.clone();

        let before = next.len();
        next.retain(|existing| !existing.same_target(&task));
        let coalesced = before - next.len();

        if next.len() >= self.capacity {
            warn!(
                capacity = self.capacity,
                entity_type = %task.entity_type(),
                "Queue at capacity, rejecting enqueue"
            );
            return Ok(EnqueueOutcome::Rejected);
        }

        let id = task.id();
        debug!(
            task_id = %id,
            entity_type = %task.entity_type(),
            operation = ?task.operation(),
            priority = ?task.priority(),
            coalesced,
            "Enqueuing task"
        );
        next.push(task);

        self.store.persist(&next).await?;
        *guard = next;
        Ok(EnqueueOutcome::Accepted(id))
    }

    /// Removes and returns the next task to execute
    ///
    /// Selection order: pending status only, then higher priority, then
    /// older creation time (FIFO within a priority). Pending tasks whose
    /// retry backoff has not elapsed are skipped. The selected task is
    /// atomically flipped to in-progress before being returned.
    pub async fn dequeue(&self) -> anyhow::Result<Option<SyncTask>> {
        self.dequeue_matching(|_| true).await
    }

    /// Like [`dequeue`](Self::dequeue), restricted to tasks accepted by
    /// `filter`
    ///
    /// Lets the engine drain one entity type at a time (dependency gating)
    /// or pull a specific file task chosen by the prioritizer, without
    /// giving up the pending/priority/FIFO selection order.
    pub async fn dequeue_matching(
        &self,
        filter: impl Fn(&SyncTask) -> bool,
    ) -> anyhow::Result<Option<SyncTask>> {
        let now = Utc::now();
        let mut guard = self.tasks.lock().await;

        let selected = guard
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_eligible_at(now) && filter(t))
            .max_by(|(_, a), (_, b)| {
                a.priority()
                    .cmp(&b.priority())
                    .then(b.created_at().cmp(&a.created_at()))
            })
            .map(|(idx, _)| idx);

        let Some(idx) = selected else {
            return Ok(None);
        };

        let mut next: Vec<SyncTask> = guard.clone();
        let task = next
            .remove(idx)
            .started()
            .map_err(anyhow::Error::from)?;
        next.insert(idx, task.clone());

        self.store.persist(&next).await?;
        *guard = next;

        debug!(task_id = %task.id(), priority = ?task.priority(), "Dequeued task");
        Ok(Some(task))
    }

    /// Marks an in-progress task as completed
    pub async fn mark_completed(&self, id: TaskId) -> anyhow::Result<()> {
        self.replace(id, |task| task.completed().map_err(anyhow::Error::from))
            .await?;
        debug!(task_id = %id, "Task completed");
        Ok(())
    }

    /// Records a task failure
    ///
    /// If the task still has retry budget it returns to pending with its
    /// retry count incremented and a backoff eligibility time; otherwise it
    /// fails terminally. Returns the resulting status so the caller can
    /// distinguish a scheduled retry from a terminal failure.
    pub async fn mark_failed(
        &self,
        id: TaskId,
        error: impl Into<String>,
    ) -> anyhow::Result<TaskStatus> {
        let error = error.into();
        let status = self
            .replace(id, |task| task.failed(error).map_err(anyhow::Error::from))
            .await?;
        match status {
            TaskStatus::Failed => warn!(task_id = %id, "Task failed terminally"),
            _ => debug!(task_id = %id, "Task scheduled for retry"),
        }
        Ok(status)
    }

    /// Records an unretriable task failure
    ///
    /// The task fails terminally regardless of its remaining retry budget.
    pub async fn mark_failed_terminal(
        &self,
        id: TaskId,
        error: impl Into<String>,
    ) -> anyhow::Result<()> {
        let error = error.into();
        self.replace(id, |task| {
            task.failed_terminally(error).map_err(anyhow::Error::from)
        })
        .await?;
        warn!(task_id = %id, "Task failed terminally (unretriable)");
        Ok(())
    }

    /// Returns an in-progress task to pending without a retry penalty
    ///
    /// Used when a sync cycle is aborted mid-task (e.g. credentials expired
    /// between dequeue and execution); the interrupted task keeps its retry
    /// count, same as crash recovery on load.
    pub async fn requeue(&self, id: TaskId) -> anyhow::Result<()> {
        self.replace(id, |task| {
            if task.status() == TaskStatus::InProgress {
                Ok(task.requeued())
            } else {
                Err(anyhow::anyhow!(
                    "Cannot requeue task {id}: not in progress"
                ))
            }
        })
        .await?;
        debug!(task_id = %id, "Task requeued");
        Ok(())
    }

    /// Cancels a task
    ///
    /// Returns true if the task was cancelled; false (and no state change)
    /// if it was unknown or already terminal.
    pub async fn cancel(&self, id: TaskId) -> anyhow::Result<bool> {
        let mut guard = self.tasks.lock().await;
        let Some(idx) = guard.iter().position(|t| t.id() == id) else {
            return Ok(false);
        };
        if guard[idx].is_terminal() {
            return Ok(false);
        }

        let mut next: Vec<SyncTask> = guard.clone();
        let task = next.remove(idx).cancelled().map_err(anyhow::Error::from)?;
        next.insert(idx, task);

        self.store.persist(&next).await?;
        *guard = next;

        info!(task_id = %id, "Task cancelled");
        Ok(true)
    }

    /// Purges terminal tasks (completed, failed, cancelled)
    ///
    /// Returns the number of tasks removed.
    pub async fn cleanup_completed(&self) -> anyhow::Result<usize> {
        let mut guard = self.tasks.lock().await;
        let mut next: Vec<SyncTask> = guard.clone();

        let before = next.len();
        next.retain(|t| !t.is_terminal());
        let removed = before - next.len();

        if removed > 0 {
            self.store.persist(&next).await?;
            *guard = next;
            info!(removed, "Purged terminal tasks");
        }
        Ok(removed)
    }

    /// Returns a copy of every task currently held
    pub async fn snapshot(&self) -> Vec<SyncTask> {
        self.tasks.lock().await.clone()
    }

    /// Returns point-in-time counters
    pub async fn stats(&self) -> QueueStats {
        let guard = self.tasks.lock().await;
        let mut stats = QueueStats::default();
        for task in guard.iter() {
            *stats.by_status.entry(task.status()).or_default() += 1;
            if task.status() == TaskStatus::Pending {
                *stats.pending_by_priority.entry(task.priority()).or_default() += 1;
            }
        }
        stats
    }

    /// Number of tasks currently held (any status)
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Returns true if the queue holds no tasks
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Stages a transition for the task with `id`, persists, then publishes
    async fn replace(
        &self,
        id: TaskId,
        transition: impl FnOnce(SyncTask) -> anyhow::Result<SyncTask>,
    ) -> anyhow::Result<TaskStatus> {
        let mut guard = self.tasks.lock().await;
        let idx = guard
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| anyhow::anyhow!("Unknown task id: {id}"))?;

        let mut next: Vec<SyncTask> = guard.clone();
        let task = transition(next.remove(idx))?;
        let status = task.status();
        next.insert(idx, task);

        self.store.persist(&next).await?;
        *guard = next;
        Ok(status)
    }
}
