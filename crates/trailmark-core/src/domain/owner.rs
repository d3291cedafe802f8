//! Owner domain entity
//!
//! An [`Owner`] is an identity that records reference through their
//! per-type owner relationship (see
//! [`EntityType::owner_relationship`](super::entity_type::EntityType::owner_relationship)).
//! At most one owner is marked "current" at a time system-wide; records
//! whose owner relationship is unset are "orphaned".

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity_type::EntityType;
use super::newtypes::{Email, OwnerId};

/// An identity that owns synchronizable records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Unique identifier for this owner
    id: OwnerId,
    /// Email address (unique, case-sensitive)
    email: Email,
    /// Username (unique, case-sensitive)
    username: String,
    /// Given name
    first_name: String,
    /// Family name
    last_name: String,
    /// Whether this is the owner actively in use by the running process
    is_current: bool,
    /// When this owner was created
    created_at: DateTime<Utc>,
}

impl Owner {
    /// Creates a new owner
    pub fn new(
        email: Email,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: OwnerId::new(),
            email,
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            is_current: false,
            created_at: Utc::now(),
        }
    }

    /// Returns the owner's unique identifier
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Returns the email address
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Returns the username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the given name
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    /// Returns the family name
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Returns true if this is the currently-active owner
    pub fn is_current(&self) -> bool {
        self.is_current
    }

    /// Returns when this owner was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Marks this owner as current
    pub fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }

    /// Full display name
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Summary of a completed ownership transfer
///
/// Purely informational output for the caller; not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferResult {
    /// Records re-parented, per entity type
    pub transferred: HashMap<EntityType, u64>,
    /// Whether the now-empty source owner was deleted
    pub source_deleted: bool,
}

impl TransferResult {
    /// Total records transferred across all entity types
    pub fn total(&self) -> u64 {
        self.transferred.values().sum()
    }
}

/// Summary of an inactive-owner cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    /// Number of owners deleted
    pub deleted_owners: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_owner() -> Owner {
        let email = Email::new("ada@example.com".to_string()).unwrap();
        Owner::new(email, "ada", "Ada", "Lovelace")
    }

    #[test]
    fn test_new_owner_is_not_current() {
        let owner = test_owner();
        assert!(!owner.is_current());
        assert_eq!(owner.username(), "ada");
        assert_eq!(owner.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_set_current() {
        let mut owner = test_owner();
        owner.set_current(true);
        assert!(owner.is_current());
    }

    #[test]
    fn test_transfer_result_total() {
        let mut result = TransferResult::default();
        result.transferred.insert(EntityType::Trip, 3);
        result.transferred.insert(EntityType::Memory, 7);
        assert_eq!(result.total(), 10);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let owner = test_owner();
        let json = serde_json::to_string(&owner).unwrap();
        let back: Owner = serde_json::from_str(&json).unwrap();
        assert_eq!(owner, back);
    }
}
