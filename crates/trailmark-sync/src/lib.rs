//! Trailmark Sync - cycle engine, ordering and scheduling
//!
//! This crate decides *what* to sync in which order and *when* a sync
//! cycle may run:
//!
//! - [`DependencyResolver`] - orders entity types and gates dependents on
//!   their dependencies holding remote identities
//! - [`prioritizer`] - pure scoring/sorting of pending file transfers
//! - [`SyncEngine`] - one sync cycle: drain the operation queue in resolver
//!   order, executing tasks against the remote service
//! - [`SyncCoordinator`] - lifecycle- and network-aware trigger/throttle
//!   scheduler; at most one cycle in flight
//!
//! ## Control Flow
//!
//! ```text
//! lifecycle events ──► SyncCoordinator ──► SyncEngine::run_cycle()
//!                          │                    │
//!                    throttle/auth gate    DependencyResolver order
//!                                               │
//!                                         OperationQueue drain
//!                                          (prioritizer for files)
//! ```

pub mod coordinator;
pub mod engine;
pub mod prioritizer;
pub mod resolver;

pub use coordinator::{ISyncRunner, SyncCoordinator, SyncTrigger};
pub use engine::{SyncEngine, SyncReport};
pub use prioritizer::{group_by_category, prioritize, score, TransferCategory};
pub use resolver::DependencyResolver;
