//! Domain entities and business logic
//!
//! This module contains the core domain types for ocsync:
//! - Newtypes for type-safe identifiers and remote paths
//! - Remote file records
//! - Operation results and the result classifier
//! - Chunk planning for uploads
//! - Server version checks
//! - Session state and failure policy
//! - Domain-specific error types

pub mod chunk;
pub mod errors;
pub mod newtypes;
pub mod remote_file;
pub mod result;
pub mod server_version;
pub mod session;

// Re-export commonly used types
pub use chunk::{ChunkPlan, CHUNK_SIZE};
pub use errors::DomainError;
pub use newtypes::*;
pub use remote_file::{FileKind, RemoteFile};
pub use result::{classify, OperationResult, RawOutcome, ResultCode, TransportFailure};
pub use server_version::{ServerStatus, ServerVersion, MIN_SERVER_VERSION};
pub use session::{
    AbortReason, FailureVerdict, SyncReport, SyncSession, SyncState, SyncStats,
    MAX_FAILED_RESULTS,
};
