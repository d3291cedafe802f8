//! File transfer candidates
//!
//! A [`FileSyncCandidate`] describes one pending binary payload transfer.
//! Candidates are ephemeral: the prioritizer recomputes them on every
//! scheduling pass and they are never persisted.

use chrono::{DateTime, Utc};

use super::entity_type::EntityType;
use super::newtypes::EntityId;

/// A pending binary payload transfer awaiting scheduling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSyncCandidate {
    /// The record the payload belongs to
    pub entity_id: EntityId,
    /// Entity type of the record
    pub entity_type: EntityType,
    /// Payload size in bytes, when known
    pub file_size_bytes: Option<u64>,
    /// When the payload was created, when known
    pub created_at: Option<DateTime<Utc>>,
    /// Derived priority score (higher = transferred sooner)
    pub score: i64,
}

impl FileSyncCandidate {
    /// Creates a candidate with an unscored payload
    pub fn new(
        entity_id: EntityId,
        entity_type: EntityType,
        file_size_bytes: Option<u64>,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            entity_id,
            entity_type,
            file_size_bytes,
            created_at,
            score: 0,
        }
    }
}
