//! Domain error types
//!
//! Raised when a value from the server, the database or the user does not
//! fit a domain type, and when a sync session is driven out of order.
//! Network outcomes are never errors here; they are classified into
//! [`OperationResult`](super::OperationResult)s instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Not an absolute, normalized server path
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Stored identifier is not a UUID
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// `status.php` version string is not dotted numbers
    #[error("Invalid server version: {0}")]
    InvalidVersion(String),

    /// Session lifecycle violated, e.g. completing a session twice
    #[error("Cannot move sync session from {from} to {to}")]
    InvalidState { from: String, to: String },

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
}
