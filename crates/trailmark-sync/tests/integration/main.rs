//! Integration tests for trailmark-sync
//!
//! Exercises full sync cycles end to end: dependency ordering, queue
//! draining, file transfer prioritization and failure handling, using
//! in-memory doubles for the local store and the remote service.

mod common;

mod test_cycle;
