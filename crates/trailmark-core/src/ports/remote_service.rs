//! Remote service port (driven/secondary port)
//!
//! This module defines the interface for the authenticated cloud backend.
//! The wire schema and the authentication protocol are out of scope for the
//! engine; the only contract is that every call may fail with a classified
//! [`RemoteError`] and that the engine must check `is_authenticated()`
//! before acting.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EntityId, EntityType, RemoteError, RemoteId};

/// A record as represented by the remote service
///
/// Port-level DTO, not a domain entity; the engine maps it onto local
/// records where needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Identity assigned by the remote service
    pub remote_id: RemoteId,
    /// Entity type of the record
    pub entity_type: EntityType,
    /// Local identity the record corresponds to
    pub entity_id: EntityId,
    /// Flattened field values
    pub fields: HashMap<String, String>,
    /// Last modification time on the remote service
    pub modified_at: DateTime<Utc>,
}

/// One page of a paginated fetch
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    /// Records in this page
    pub records: Vec<RemoteRecord>,
    /// Opaque cursor for the next page (`None` when exhausted)
    pub next_cursor: Option<String>,
}

/// Port trait for the remote API client
#[async_trait]
pub trait IRemoteService: Send + Sync {
    /// Returns true if a usable credential is available
    ///
    /// A missing or expired credential is an unretriable precondition
    /// failure: the engine skips the sync attempt instead of calling out.
    async fn is_authenticated(&self) -> bool;

    /// Creates a record, returning its assigned remote identity
    async fn create_record(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        fields: &HashMap<String, String>,
    ) -> Result<RemoteId, RemoteError>;

    /// Pushes field changes to an existing record
    async fn update_record(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        fields: &HashMap<String, String>,
    ) -> Result<(), RemoteError>;

    /// Deletes a record
    async fn delete_record(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<(), RemoteError>;

    /// Uploads the binary payload of a file-bearing record
    async fn upload_file(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<RemoteId, RemoteError>;

    /// Downloads the binary payload of a file-bearing record
    async fn download_file(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<Vec<u8>, RemoteError>;

    /// Fetches one page of records of the given type
    async fn fetch_page(
        &self,
        entity_type: EntityType,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<RemotePage, RemoteError>;
}
