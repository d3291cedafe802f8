//! Ownership engine
//!
//! Each public operation claims an exclusive busy flag, opens one
//! transaction on the local store, performs all of its mutations inside
//! it, and commits. Any failure rolls the transaction back, so a bulk
//! operation is never partially applied. Long-running operations report
//! progress in `0.0..=1.0` through an optional callback; reported values
//! never decrease.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use trailmark_core::domain::{
    CleanupResult, Email, EntityType, Owner, OwnerId, TransferResult, UserError,
};
use trailmark_core::ports::{ILocalStore, ILocalTransaction};

/// Progress callback for bulk operations
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// Bulk ownership operations over the local store
pub struct OwnershipEngine {
    store: Arc<dyn ILocalStore>,
    /// Set while a bulk operation is running; claimed via compare-and-swap
    busy: AtomicBool,
}

/// Releases the busy flag when the operation ends, on every path
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OwnershipEngine {
    /// Creates an engine over the given store
    pub fn new(store: Arc<dyn ILocalStore>) -> Self {
        Self {
            store,
            busy: AtomicBool::new(false),
        }
    }

    /// Whether a bulk operation is currently running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn claim(&self) -> Result<BusyGuard<'_>, UserError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UserError::BulkOperationInProgress);
        }
        Ok(BusyGuard(&self.busy))
    }

    /// Assigns every orphaned record of the given types to `owner`
    ///
    /// Built-in system records of types that have them are never adopted.
    /// Returns the number of records assigned, per entity type.
    ///
    /// # Errors
    ///
    /// [`UserError::UserNotFound`] if `owner` does not exist;
    /// [`UserError::BulkOperationInProgress`] if another bulk operation is
    /// running. Nothing is applied on error.
    pub async fn assign_orphaned_entities(
        &self,
        owner: OwnerId,
        types: &[EntityType],
        progress: Option<&ProgressFn>,
    ) -> Result<HashMap<EntityType, u64>, UserError> {
        let _guard = self.claim()?;
        let mut tx = self.store.begin().await.map_err(UserError::Store)?;

        match Self::assign_inner(tx.as_mut(), owner, types, progress).await {
            Ok(assigned) => {
                tx.commit().await.map_err(UserError::Store)?;
                info!(
                    owner = %owner,
                    total = assigned.values().sum::<u64>(),
                    "Orphaned records assigned"
                );
                Ok(assigned)
            }
            Err(err) => {
                rollback_quietly(tx).await;
                Err(err)
            }
        }
    }

    async fn assign_inner(
        tx: &mut dyn ILocalTransaction,
        owner: OwnerId,
        types: &[EntityType],
        progress: Option<&ProgressFn>,
    ) -> Result<HashMap<EntityType, u64>, UserError> {
        if tx.find_owner(owner).await?.is_none() {
            return Err(UserError::UserNotFound(owner.to_string()));
        }

        let mut assigned = HashMap::new();
        for (done, entity_type) in types.iter().enumerate() {
            let orphans = tx
                .find_orphaned(*entity_type, entity_type.has_system_records())
                .await?;
            if !orphans.is_empty() {
                let count = tx.set_owner(*entity_type, &orphans, owner).await?;
                debug!(
                    entity = %entity_type,
                    relationship = entity_type.owner_relationship(),
                    count,
                    "Adopted orphaned records"
                );
                assigned.insert(*entity_type, count);
            }
            report(progress, done + 1, types.len());
        }
        Ok(assigned)
    }

    /// Re-parents every record owned by `from` to `to`
    ///
    /// With `delete_source`, the source user is deleted afterwards unless
    /// it is the current user, which is never deleted.
    ///
    /// # Errors
    ///
    /// [`UserError::UserNotFound`] if either user does not exist;
    /// [`UserError::BulkOperationInProgress`] if another bulk operation is
    /// running. Nothing is applied on error.
    pub async fn transfer_user_data(
        &self,
        from: OwnerId,
        to: OwnerId,
        delete_source: bool,
        progress: Option<&ProgressFn>,
    ) -> Result<TransferResult, UserError> {
        if from == to {
            return Err(UserError::Store(anyhow::anyhow!(
                "Source and target user are the same"
            )));
        }
        let _guard = self.claim()?;
        let mut tx = self.store.begin().await.map_err(UserError::Store)?;

        match Self::transfer_inner(tx.as_mut(), from, to, delete_source, progress).await {
            Ok(result) => {
                tx.commit().await.map_err(UserError::Store)?;
                info!(
                    from = %from,
                    to = %to,
                    total = result.total(),
                    source_deleted = result.source_deleted,
                    "User data transferred"
                );
                Ok(result)
            }
            Err(err) => {
                rollback_quietly(tx).await;
                Err(err)
            }
        }
    }

    async fn transfer_inner(
        tx: &mut dyn ILocalTransaction,
        from: OwnerId,
        to: OwnerId,
        delete_source: bool,
        progress: Option<&ProgressFn>,
    ) -> Result<TransferResult, UserError> {
        let source = tx
            .find_owner(from)
            .await?
            .ok_or_else(|| UserError::UserNotFound(from.to_string()))?;
        if tx.find_owner(to).await?.is_none() {
            return Err(UserError::UserNotFound(to.to_string()));
        }

        let mut result = TransferResult::default();
        let types = EntityType::ALL;
        for (done, entity_type) in types.iter().enumerate() {
            let moved = tx.reassign_owner(*entity_type, from, to).await?;
            if moved > 0 {
                debug!(
                    entity = %entity_type,
                    relationship = entity_type.owner_relationship(),
                    moved,
                    "Re-parented records"
                );
                result.transferred.insert(*entity_type, moved);
            }
            report(progress, done + 1, types.len());
        }

        if delete_source {
            if source.is_current() {
                warn!(user = %from, "Source user is current, keeping it");
            } else {
                tx.delete_owner(from).await?;
                result.source_deleted = true;
            }
        }
        Ok(result)
    }

    /// Deletes every non-current user that owns no records of any type
    pub async fn cleanup_inactive_users(&self) -> Result<CleanupResult, UserError> {
        let _guard = self.claim()?;
        let mut tx = self.store.begin().await.map_err(UserError::Store)?;

        match Self::cleanup_inner(tx.as_mut()).await {
            Ok(result) => {
                tx.commit().await.map_err(UserError::Store)?;
                info!(deleted = result.deleted_owners, "Inactive users cleaned up");
                Ok(result)
            }
            Err(err) => {
                rollback_quietly(tx).await;
                Err(err)
            }
        }
    }

    async fn cleanup_inner(tx: &mut dyn ILocalTransaction) -> Result<CleanupResult, UserError> {
        let mut result = CleanupResult::default();
        for owner in tx.owners().await? {
            // The current user is never deleted, even if empty
            if owner.is_current() {
                continue;
            }
            let mut owned = 0u64;
            for entity_type in EntityType::ALL.iter() {
                owned += tx.owned_count(*entity_type, owner.id()).await?;
                if owned > 0 {
                    break;
                }
            }
            if owned == 0 {
                debug!(user = %owner.id(), "Deleting inactive user");
                tx.delete_owner(owner.id()).await?;
                result.deleted_owners += 1;
            }
        }
        Ok(result)
    }

    /// Creates a user, optionally making it the sole current user
    ///
    /// Email and username are unique, compared case-sensitively.
    ///
    /// # Errors
    ///
    /// [`UserError::UserAlreadyExists`] on a collision;
    /// [`UserError::BulkOperationInProgress`] if another bulk operation is
    /// running.
    pub async fn create_user(
        &self,
        email: Email,
        username: &str,
        first_name: &str,
        last_name: &str,
        set_as_current: bool,
    ) -> Result<Owner, UserError> {
        let _guard = self.claim()?;
        let mut tx = self.store.begin().await.map_err(UserError::Store)?;

        match Self::create_inner(tx.as_mut(), email, username, first_name, last_name, set_as_current)
            .await
        {
            Ok(owner) => {
                tx.commit().await.map_err(UserError::Store)?;
                info!(user = %owner.id(), username = owner.username(), "User created");
                Ok(owner)
            }
            Err(err) => {
                rollback_quietly(tx).await;
                Err(err)
            }
        }
    }

    async fn create_inner(
        tx: &mut dyn ILocalTransaction,
        email: Email,
        username: &str,
        first_name: &str,
        last_name: &str,
        set_as_current: bool,
    ) -> Result<Owner, UserError> {
        let existing = tx.owners().await?;
        for owner in &existing {
            if owner.email() == &email {
                return Err(UserError::UserAlreadyExists(email.to_string()));
            }
            if owner.username() == username {
                return Err(UserError::UserAlreadyExists(username.to_string()));
            }
        }

        let mut owner = Owner::new(email, username, first_name, last_name);
        if set_as_current {
            // At most one current user system-wide
            for other in existing {
                if other.is_current() {
                    let mut demoted = other;
                    demoted.set_current(false);
                    tx.update_owner(&demoted).await?;
                }
            }
            owner.set_current(true);
        }
        tx.insert_owner(&owner).await?;
        Ok(owner)
    }
}

/// Emits a monotonic progress fraction for `done` of `total` steps
fn report(progress: Option<&ProgressFn>, done: usize, total: usize) {
    if let Some(callback) = progress {
        if total > 0 {
            callback(done as f64 / total as f64);
        }
    }
}

async fn rollback_quietly(tx: Box<dyn ILocalTransaction>) {
    if let Err(err) = tx.rollback().await {
        warn!("Transaction rollback failed: {err}");
    }
}
