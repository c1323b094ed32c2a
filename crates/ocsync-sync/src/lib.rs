//! ocsync Sync - folder synchronization and session orchestration
//!
//! Provides:
//! - Single-level folder synchronization against local storage
//! - Depth-first sync sessions with cancellation and failure thresholds
//!
//! ## Modules
//!
//! - [`folder`] - One folder listing merged into local storage
//! - [`orchestrator`] - Session lifecycle and tree traversal

pub mod folder;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

pub use folder::{FolderSyncOutcome, SynchronizeFolderOperation};
pub use orchestrator::{SyncOrchestrator, SyncRequest};

/// Errors that can occur while running a sync session
///
/// Remote and storage failures are not errors at this level; they end up
/// as classified results in the session report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A session state transition was rejected
    #[error("Domain error: {0}")]
    DomainError(#[from] ocsync_core::domain::DomainError),
}
