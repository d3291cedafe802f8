//! Domain error types
//!
//! This module defines the error taxonomy for the sync engine:
//! - [`DomainError`] - validation failures on domain value construction
//! - [`RemoteError`] - classified remote-service failures (retriable or not)
//! - [`SyncError`] - sync-cycle level errors (dependency gating, auth)
//! - [`UserError`] - ownership-engine precondition violations

use thiserror::Error;

use super::entity_type::EntityType;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid state transition attempt
    #[error("Invalid task transition from {from} to {to}")]
    InvalidTransition {
        /// The current status
        from: String,
        /// The attempted target status
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Classified failure from the remote service
///
/// Tasks that fail with a retriable error are re-enqueued (up to their
/// retry budget); non-retriable errors fail the task terminally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No network connectivity at the time of the call
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// The bounded wait at the call boundary elapsed
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The remote service returned a server-side error
    #[error("Server error (status {0})")]
    Server(u16),

    /// Missing or expired credential
    #[error("Not authenticated")]
    Unauthorized,
}

impl RemoteError {
    /// Returns true if the failure is transient and the operation may be retried
    ///
    /// Authentication failures are an unretriable precondition: retrying
    /// without a fresh credential cannot succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            RemoteError::NetworkUnavailable | RemoteError::Timeout(_) => true,
            RemoteError::Server(status) => *status >= 500,
            RemoteError::Unauthorized => false,
        }
    }
}

/// Errors raised while running a sync cycle
#[derive(Debug, Error)]
pub enum SyncError {
    /// A dependency entity type still has records without a remote identity
    #[error("Cannot sync {entity}: dependency {missing} has unsynced records")]
    DependencyNotMet {
        /// The entity type whose sync was halted
        entity: EntityType,
        /// The dependency that is not yet fully synced
        missing: EntityType,
    },

    /// The caller is not authenticated; the sync attempt is skipped silently
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Local store failure surfaced through a port
    #[error("Local store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Errors raised by the ownership engine
///
/// All variants abort and roll back the whole bulk operation; nothing is
/// partially applied.
#[derive(Debug, Error)]
pub enum UserError {
    /// The referenced owner does not exist in the transaction's context
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Email or username collides with an existing owner (case-sensitive)
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    /// Another bulk operation is already running on the background context
    #[error("A bulk ownership operation is already in progress")]
    BulkOperationInProgress,

    /// Local store failure surfaced through a port
    #[error("Local store error: {0}")]
    Store(#[from] anyhow::Error),
}
