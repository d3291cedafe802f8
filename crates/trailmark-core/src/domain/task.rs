//! SyncTask domain entity
//!
//! A [`SyncTask`] is one discrete unit of sync work: create/update/delete a
//! record on the remote service, or transfer a binary file payload. Tasks
//! are immutable value records; lifecycle transitions are pure functions
//! that consume the old record and produce the next one, so the queue only
//! ever stores the latest record per id.
//!
//! ## State Machine
//!
//! ```text
//!    enqueue          dequeue            success
//!   ───────► Pending ────────► InProgress ───────► Completed
//!               ▲                  │
//!               │   retriable      │  retries exhausted
//!               └──────────────────┼─────────────► Failed
//!                 (retry_count+1)  │
//!                                  ▼
//!            any non-terminal ► Cancelled
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::entity_type::EntityType;
use super::errors::DomainError;
use super::newtypes::{EntityId, TaskId};

/// Base delay for retry backoff (1 second, doubling per attempt)
const BACKOFF_BASE_SECS: i64 = 1;

/// Cap on the retry backoff delay
const BACKOFF_MAX_SECS: i64 = 300;

/// The kind of work a sync task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOperation {
    /// Create the record on the remote service
    Create,
    /// Push local changes to an existing remote record
    Update,
    /// Delete the remote record
    Delete,
    /// Upload a binary file payload
    FileUpload,
    /// Download a binary file payload
    FileDownload,
}

impl TaskOperation {
    /// Returns true if this operation transfers a binary payload
    pub fn is_file_transfer(&self) -> bool {
        matches!(self, TaskOperation::FileUpload | TaskOperation::FileDownload)
    }
}

/// Scheduling priority of a task (higher variants dequeue first)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background housekeeping work
    Low,
    /// Regular sync work
    #[default]
    Normal,
    /// User-visible content
    High,
    /// Must run before anything else
    Critical,
}

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be dequeued
    #[default]
    Pending,
    /// Currently executing
    InProgress,
    /// Finished successfully (terminal)
    Completed,
    /// Retries exhausted (terminal)
    Failed,
    /// Explicitly cancelled (terminal)
    Cancelled,
}

impl TaskStatus {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Returns the status name as a string
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }
}

/// One unit of sync work destined for the remote service
///
/// Immutable after construction; use the transition methods to derive the
/// next record in the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    /// Unique identifier for this task
    id: TaskId,
    /// Entity type the task operates on
    entity_type: EntityType,
    /// Target record in the local store
    entity_id: EntityId,
    /// Kind of work to perform
    operation: TaskOperation,
    /// Scheduling priority
    priority: TaskPriority,
    /// Arbitrary operation parameters (caller-defined)
    payload: HashMap<String, String>,
    /// When the task was enqueued
    created_at: DateTime<Utc>,
    /// Number of failed attempts so far
    retry_count: u32,
    /// Maximum number of retries before the task fails terminally
    max_retries: u32,
    /// Current lifecycle status
    status: TaskStatus,
    /// Message from the most recent failure
    last_error: Option<String>,
    /// Earliest time a retried task becomes eligible for dequeue
    next_eligible_at: Option<DateTime<Utc>>,
}

impl SyncTask {
    /// Creates a new pending task
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        operation: TaskOperation,
        priority: TaskPriority,
        payload: HashMap<String, String>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: TaskId::new(),
            entity_type,
            entity_id,
            operation,
            priority,
            payload,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries,
            status: TaskStatus::Pending,
            last_error: None,
            next_eligible_at: None,
        }
    }

    // --- Getters ---

    /// Returns the task's unique identifier
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the entity type this task operates on
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Returns the target entity id
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Returns the operation kind
    pub fn operation(&self) -> TaskOperation {
        self.operation
    }

    /// Returns the scheduling priority
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Returns the operation payload
    pub fn payload(&self) -> &HashMap<String, String> {
        &self.payload
    }

    /// Returns when the task was enqueued
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the number of failed attempts so far
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the retry budget
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the current status
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the most recent failure message
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the earliest dequeue-eligible time for a retried task
    pub fn next_eligible_at(&self) -> Option<DateTime<Utc>> {
        self.next_eligible_at
    }

    /// Returns true if the task is in a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the task is pending and its retry backoff has elapsed
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending
            && self.next_eligible_at.map_or(true, |at| at <= now)
    }

    /// Returns true if `other` targets the same (entity type, entity id,
    /// operation) tuple
    ///
    /// The queue coalesces matching tasks on enqueue: only the most recent
    /// request for a given operation on a given entity is kept.
    pub fn same_target(&self, other: &SyncTask) -> bool {
        self.entity_type == other.entity_type
            && self.entity_id == other.entity_id
            && self.operation == other.operation
    }

    // --- Pure transitions ---

    /// Derives the in-progress record (dequeue)
    pub fn started(self) -> Result<Self, DomainError> {
        self.transition(TaskStatus::Pending, TaskStatus::InProgress, |task| task)
    }

    /// Derives the completed record (success)
    pub fn completed(self) -> Result<Self, DomainError> {
        self.transition(TaskStatus::InProgress, TaskStatus::Completed, |task| task)
    }

    /// Derives the record after a failure
    ///
    /// If retries remain, the task returns to pending with its retry count
    /// incremented, the error recorded, and an exponential-backoff
    /// eligibility time. Otherwise the task fails terminally.
    pub fn failed(self, error: impl Into<String>) -> Result<Self, DomainError> {
        if self.status != TaskStatus::InProgress {
            return Err(DomainError::InvalidTransition {
                from: self.status.name().to_string(),
                to: TaskStatus::Failed.name().to_string(),
            });
        }

        let error = error.into();
        if self.retry_count < self.max_retries {
            let delay = Self::backoff_delay(self.retry_count);
            Ok(Self {
                status: TaskStatus::Pending,
                retry_count: self.retry_count + 1,
                last_error: Some(error),
                next_eligible_at: Some(Utc::now() + delay),
                ..self
            })
        } else {
            Ok(Self {
                status: TaskStatus::Failed,
                last_error: Some(error),
                next_eligible_at: None,
                ..self
            })
        }
    }

    /// Derives the terminally-failed record, ignoring remaining retry budget
    ///
    /// Used for unretriable failures (e.g. a rejected request) where
    /// retrying cannot succeed.
    pub fn failed_terminally(self, error: impl Into<String>) -> Result<Self, DomainError> {
        if self.status != TaskStatus::InProgress {
            return Err(DomainError::InvalidTransition {
                from: self.status.name().to_string(),
                to: TaskStatus::Failed.name().to_string(),
            });
        }
        Ok(Self {
            status: TaskStatus::Failed,
            last_error: Some(error.into()),
            next_eligible_at: None,
            ..self
        })
    }

    /// Derives the cancelled record
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the task is already
    /// terminal.
    pub fn cancelled(self) -> Result<Self, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.status.name().to_string(),
                to: TaskStatus::Cancelled.name().to_string(),
            });
        }
        Ok(Self {
            status: TaskStatus::Cancelled,
            ..self
        })
    }

    /// Derives a pending record from a task interrupted by a crash
    ///
    /// Used when reloading a persisted queue that still contains in-progress
    /// tasks: they are requeued with their retry count unchanged
    /// (at-least-once delivery).
    pub fn requeued(self) -> Self {
        Self {
            status: TaskStatus::Pending,
            next_eligible_at: None,
            ..self
        }
    }

    fn transition(
        self,
        expected: TaskStatus,
        target: TaskStatus,
        build: impl FnOnce(Self) -> Self,
    ) -> Result<Self, DomainError> {
        if self.status != expected {
            return Err(DomainError::InvalidTransition {
                from: self.status.name().to_string(),
                to: target.name().to_string(),
            });
        }
        let mut next = build(self);
        next.status = target;
        Ok(next)
    }

    /// Exponential backoff: 1s, 2s, 4s, ... capped at 300s
    fn backoff_delay(retry_count: u32) -> Duration {
        let secs = BACKOFF_BASE_SECS
            .saturating_mul(2i64.saturating_pow(retry_count))
            .min(BACKOFF_MAX_SECS);
        Duration::seconds(secs)
    }
}
