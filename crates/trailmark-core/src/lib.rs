//! Trailmark Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncTask`, `Owner`, `EntityType`, `FileSyncCandidate`
//! - **Port definitions** - Traits for adapters: `ILocalStore`, `IRemoteService`, `IQueueStore`
//! - **Error taxonomy** - Classified sync and ownership errors
//! - **Configuration** - Typed config with YAML load/save
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that the host application's adapters implement
//! (the embedded local store and the authenticated remote API client live
//! outside this workspace). The sibling crates implement the engine itself:
//! `trailmark-queue`, `trailmark-cache`, `trailmark-sync`, `trailmark-users`.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
