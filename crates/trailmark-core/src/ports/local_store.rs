//! Local store port (driven/secondary port)
//!
//! This module defines the interface for the embedded local database: a
//! transactional object store supporting predicate-based queries and atomic
//! commit/rollback. The sync engine never touches storage directly; the
//! host application provides the adapter.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   don't need domain-level classification.
//! - Bulk mutations go through [`ILocalTransaction`]: all changes made
//!   between `begin()` and `commit()` are applied atomically; dropping the
//!   transaction or calling `rollback()` discards them.
//! - Transactions are expected to run on a background context distinct from
//!   any UI-facing context, so interactive reads are never blocked.

use async_trait::async_trait;

use crate::domain::{EntityId, EntityType, Owner, OwnerId};

/// Port trait for the embedded local store
#[async_trait]
pub trait ILocalStore: Send + Sync {
    /// Counts records of `entity_type` that have not been assigned a remote
    /// identity yet
    ///
    /// Used by dependency validation: a non-zero count means the type is
    /// not safe to depend on.
    async fn count_unsynced(&self, entity_type: EntityType) -> anyhow::Result<u64>;

    /// Returns true if a record with the given identity exists
    async fn record_exists(&self, entity_type: EntityType, id: EntityId) -> anyhow::Result<bool>;

    /// Writes a downloaded binary payload for a file-bearing record
    async fn save_payload(
        &self,
        entity_type: EntityType,
        id: EntityId,
        bytes: &[u8],
    ) -> anyhow::Result<()>;

    /// Opens a transactional context for bulk mutations
    async fn begin(&self) -> anyhow::Result<Box<dyn ILocalTransaction>>;
}

/// A transactional scope over the local store
///
/// All mutations are staged until `commit()`; `rollback()` (or dropping the
/// transaction without committing) discards them. Implementations only need
/// `Send`: a transaction is driven by a single task from begin to commit.
#[async_trait]
pub trait ILocalTransaction: Send {
    /// Finds records of `entity_type` whose owner relationship is unset
    ///
    /// When `exclude_system` is true, built-in system records are filtered
    /// out and will never appear in the result.
    async fn find_orphaned(
        &mut self,
        entity_type: EntityType,
        exclude_system: bool,
    ) -> anyhow::Result<Vec<EntityId>>;

    /// Sets the owner relationship of the given records, returning the
    /// number of records updated
    async fn set_owner(
        &mut self,
        entity_type: EntityType,
        ids: &[EntityId],
        owner: OwnerId,
    ) -> anyhow::Result<u64>;

    /// Re-parents every record of `entity_type` owned by `from` to `to`,
    /// returning the number of records updated
    async fn reassign_owner(
        &mut self,
        entity_type: EntityType,
        from: OwnerId,
        to: OwnerId,
    ) -> anyhow::Result<u64>;

    /// Counts records of `entity_type` owned by `owner`
    async fn owned_count(&mut self, entity_type: EntityType, owner: OwnerId)
        -> anyhow::Result<u64>;

    /// Lists all owners
    async fn owners(&mut self) -> anyhow::Result<Vec<Owner>>;

    /// Looks up an owner by id
    async fn find_owner(&mut self, id: OwnerId) -> anyhow::Result<Option<Owner>>;

    /// Inserts a new owner
    async fn insert_owner(&mut self, owner: &Owner) -> anyhow::Result<()>;

    /// Updates an existing owner (e.g. its current flag)
    async fn update_owner(&mut self, owner: &Owner) -> anyhow::Result<()>;

    /// Deletes an owner
    async fn delete_owner(&mut self, id: OwnerId) -> anyhow::Result<()>;

    /// Atomically applies all staged mutations
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;

    /// Discards all staged mutations
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}
