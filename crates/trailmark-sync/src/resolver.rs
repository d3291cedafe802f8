//! Dependency resolver
//!
//! Orders entity types for safe synchronization and validates, at sync
//! time, that a type's dependencies are actually satisfied in the local
//! store. The static graph lives on
//! [`EntityType`](trailmark_core::domain::EntityType); this module adds the
//! runtime check against unsynced records.

use tracing::debug;

use trailmark_core::domain::{EntityType, SyncError};
use trailmark_core::ports::ILocalStore;

/// Resolves the processing order of entity types and gates dependents
///
/// `resolve_order` and `dependencies_of` are pure and deterministic;
/// `validate_dependencies` queries the local store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Creates a resolver
    pub fn new() -> Self {
        Self
    }

    /// All entity types, ascending by sync order
    ///
    /// Stable across repeated calls.
    pub fn resolve_order(&self) -> Vec<EntityType> {
        let mut types = EntityType::ALL.to_vec();
        types.sort_by_key(EntityType::sync_order);
        types
    }

    /// The direct dependencies of `entity_type`
    pub fn dependencies_of(&self, entity_type: EntityType) -> &'static [EntityType] {
        entity_type.dependencies()
    }

    /// Checks that every dependency of `entity_type` is fully synced
    ///
    /// A dependency is unmet when the local store still holds records of
    /// that type without a remote identity: syncing the dependent first
    /// would create dangling remote references.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DependencyNotMet`] naming the first unmet
    /// dependency.
    pub async fn validate_dependencies(
        &self,
        store: &dyn ILocalStore,
        entity_type: EntityType,
    ) -> Result<(), SyncError> {
        for dep in entity_type.dependencies() {
            let unsynced = store.count_unsynced(*dep).await?;
            if unsynced > 0 {
                debug!(
                    entity = %entity_type,
                    dependency = %dep,
                    unsynced,
                    "Dependency not met"
                );
                return Err(SyncError::DependencyNotMet {
                    entity: entity_type,
                    missing: *dep,
                });
            }
        }
        Ok(())
    }
}
