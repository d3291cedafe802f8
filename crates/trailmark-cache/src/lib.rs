//! Trailmark Cache - Expiring response cache
//!
//! A generic time-boxed key→value store that reduces redundant remote
//! calls during sync. Entries carry a TTL and are evicted lazily on lookup,
//! proactively by a periodic background sweep, and by least-recently-used
//! eviction when the cache exceeds its entry-count or serialized-byte
//! budget.
//!
//! ## Concurrency
//!
//! The key→entry map is a sharded [`dashmap::DashMap`], so reads and writes
//! of unrelated keys proceed concurrently while operations touching the
//! same key's bookkeeping are mutually exclusive. Recency and cost
//! accounting use atomics and are never observed mid-mutation.
//!
//! ## Key Format
//!
//! Keys are caller-chosen strings; callers must pick keys unique per
//! (entity type, entity id, representation) to avoid collisions, e.g.
//! `"memory:<uuid>:remote"`.

pub mod cache;

pub use cache::{CacheStats, ExpiringCache};
