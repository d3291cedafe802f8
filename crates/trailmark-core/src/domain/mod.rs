//! Domain entities and business logic
//!
//! This module contains the core domain types for the Trailmark sync engine:
//! - Newtypes for type-safe identifiers and validated domain types
//! - The entity-type table with sync ordering and dependency metadata
//! - Sync task records and their pure transition functions
//! - Owner entities and bulk-operation result summaries
//! - File transfer candidates
//! - Domain-specific error types

pub mod candidate;
pub mod entity_type;
pub mod errors;
pub mod newtypes;
pub mod owner;
pub mod task;

// Re-export commonly used types
pub use candidate::FileSyncCandidate;
pub use entity_type::EntityType;
pub use errors::{DomainError, RemoteError, SyncError, UserError};
pub use newtypes::*;
pub use owner::{CleanupResult, Owner, TransferResult};
pub use task::{SyncTask, TaskOperation, TaskPriority, TaskStatus};
