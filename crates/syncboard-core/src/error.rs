//! Error types for sync coordination
//!
//! Backend failures are expected and always resolved into a display status
//! plus an optional notification; they never escape `trigger()` or the poll
//! loop. Only lifecycle misuse surfaces as a `SessionError`.

use thiserror::Error;

/// Errors reported by the status backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The request could not be completed (network, timeout, bad response)
    #[error("transport error: {0}")]
    Transport(String),

    /// The server refused to start a sync (validation, bad state)
    #[error("sync rejected for '{resource}': {reason}")]
    Rejected { resource: String, reason: String },

    /// The resource does not exist on the server
    #[error("resource not found: '{0}'")]
    NotFound(String),
}

/// Lifecycle misuse errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `trigger()` was called on a destroyed session
    #[error("sync session for '{0}' has been destroyed")]
    Destroyed(String),

    /// The registry was asked about a resource it does not track
    #[error("resource '{0}' is not registered")]
    NotRegistered(String),
}
