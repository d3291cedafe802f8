//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the engine depends
//! on, but whose implementations live in the host application's adapters.
//!
//! ## Ports Overview
//!
//! - [`ILocalStore`] - the embedded transactional object store
//! - [`IRemoteService`] - the authenticated remote API client
//! - [`IQueueStore`] - persistence for the operation-queue snapshot

pub mod local_store;
pub mod queue_store;
pub mod remote_service;

pub use local_store::{ILocalStore, ILocalTransaction};
pub use queue_store::IQueueStore;
pub use remote_service::{IRemoteService, RemotePage, RemoteRecord};
