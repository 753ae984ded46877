//! Remote collaborator error taxonomy

use thiserror::Error;

/// Failure of a remote data-service call
///
/// These are the only errors the collaborator surface may produce.
/// Local validation failures never reach this type; they are rejected
/// before a remote call is attempted.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Transport or service unavailable
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The write conflicted with concurrent server-side state
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is not allowed to perform this operation
    #[error("permission denied: {0}")]
    Denied(String),

    /// The record does not exist on the service
    #[error("{collection} record not found: {id}")]
    NotFound { collection: String, id: String },

    /// The service returned a payload the client could not decode
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for remote collaborator calls
pub type RemoteResult<T> = Result<T, RemoteError>;
