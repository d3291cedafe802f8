//! Trailmark Queue - Durable, prioritized, retryable operation queue
//!
//! The central data-plane primitive of the sync engine. Every unit of sync
//! work becomes a [`SyncTask`](trailmark_core::domain::SyncTask) held by the
//! [`OperationQueue`], which:
//!
//! - coalesces duplicate work (one surviving task per
//!   (entity type, entity id, operation) tuple)
//! - rejects enqueues beyond its capacity as backpressure
//! - dequeues by pending status, then priority, then FIFO
//! - retries failed tasks with exponential backoff until their budget is
//!   exhausted
//! - persists its full snapshot through an
//!   [`IQueueStore`](trailmark_core::ports::IQueueStore) before any mutating
//!   call returns, so the exact queue state survives a process crash
//!
//! ## Key Components
//!
//! - [`OperationQueue`] - the shared queue, one mutex over list and mirror
//! - [`JsonQueueStore`] - atomic JSON-file snapshot store
//! - [`MemoryQueueStore`] - in-memory store for tests

pub mod queue;
pub mod store;

pub use queue::{EnqueueOutcome, OperationQueue, QueueStats};
pub use store::{JsonQueueStore, MemoryQueueStore};
