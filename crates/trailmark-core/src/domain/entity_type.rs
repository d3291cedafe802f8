//! The entity-type table
//!
//! Every synchronizable record in Trailmark belongs to exactly one
//! [`EntityType`]. Each type carries two static attributes that drive the
//! sync engine:
//!
//! - `sync_order()` - a total order, unique per type, in which types are
//!   processed during a sync cycle
//! - `dependencies()` - the set of types that must be fully synced (assigned
//!   a remote identity) before this type may sync
//!
//! The dependency relation is acyclic and consistent with the sync order:
//! if B depends on A, then `sync_order(A) < sync_order(B)`. This is enforced
//! by tests rather than runtime checks since both attributes are static.
//!
//! The per-type owner relationship name and the system-record flag are also
//! defined here as exhaustive matches, so adding a variant forces every
//! site to be updated at compile time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A category of synchronizable record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Trip categories (some are built-in system records)
    Category,
    /// User and built-in tags
    Tag,
    /// Packing/checklist item templates
    ChecklistItem,
    /// A journey with a date range and destinations
    Trip,
    /// A journal entry attached to a trip
    Memory,
    /// A photo or video payload attached to a memory
    MediaItem,
    /// A recorded GPS track for a trip
    Track,
}

impl EntityType {
    /// All entity types, in declaration order
    pub const ALL: [EntityType; 7] = [
        EntityType::Category,
        EntityType::Tag,
        EntityType::ChecklistItem,
        EntityType::Trip,
        EntityType::Memory,
        EntityType::MediaItem,
        EntityType::Track,
    ];

    /// Position of this type in the global sync order (lower syncs first)
    pub fn sync_order(&self) -> u32 {
        match self {
            EntityType::Category => 1,
            EntityType::Tag => 2,
            EntityType::ChecklistItem => 3,
            EntityType::Trip => 4,
            EntityType::Memory => 5,
            EntityType::MediaItem => 6,
            EntityType::Track => 7,
        }
    }

    /// Entity types that must hold a remote identity before this type syncs
    ///
    /// Syncing a dependent before its dependency would create dangling
    /// remote references (e.g. a Memory pointing at a Trip the remote
    /// service has never seen).
    pub fn dependencies(&self) -> &'static [EntityType] {
        match self {
            EntityType::Category => &[],
            EntityType::Tag => &[],
            EntityType::ChecklistItem => &[EntityType::Category],
            EntityType::Trip => &[EntityType::Category],
            EntityType::Memory => &[EntityType::Trip, EntityType::Tag],
            EntityType::MediaItem => &[EntityType::Trip, EntityType::Memory],
            EntityType::Track => &[EntityType::Trip],
        }
    }

    /// Name of the single-valued relationship linking records of this type
    /// to their owner
    pub fn owner_relationship(&self) -> &'static str {
        match self {
            EntityType::Category => "owner",
            EntityType::Tag => "owner",
            EntityType::ChecklistItem => "owner",
            EntityType::Trip => "owner",
            EntityType::Memory => "creator",
            EntityType::MediaItem => "uploader",
            EntityType::Track => "recorder",
        }
    }

    /// Returns true if this type contains built-in system records
    ///
    /// System records (built-in categories and tags) are shipped with the
    /// app, have no owner, and must never be claimed by orphan assignment.
    pub fn has_system_records(&self) -> bool {
        matches!(self, EntityType::Category | EntityType::Tag)
    }

    /// Returns true if records of this type carry a binary file payload
    pub fn is_file_bearing(&self) -> bool {
        matches!(self, EntityType::MediaItem | EntityType::Track)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Category => "category",
            EntityType::Tag => "tag",
            EntityType::ChecklistItem => "checklist_item",
            EntityType::Trip => "trip",
            EntityType::Memory => "memory",
            EntityType::MediaItem => "media_item",
            EntityType::Track => "track",
        };
        write!(f, "{name}")
    }
}
