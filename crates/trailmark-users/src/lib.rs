//! Trailmark Users - multi-user ownership engine
//!
//! Bulk ownership maintenance over the local store: adopting orphaned
//! records, transferring a user's data to another user, cleaning up
//! inactive users, and creating users with an exclusive "current" flag.
//!
//! Every operation runs inside one transaction on the store's background
//! context and is all-or-nothing; at most one bulk operation runs at a
//! time.

pub mod engine;

pub use engine::{OwnershipEngine, ProgressFn};
