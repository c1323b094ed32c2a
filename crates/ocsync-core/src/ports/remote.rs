//! Remote server ports (driven/secondary ports)
//!
//! This module defines the read-side interface to the server: single-level
//! folder listings and the installation status check.
//!
//! ## Design Notes
//!
//! - Failures are returned as an already classified [`OperationResult`],
//!   never as raw transport errors. Adapters own the translation.
//! - A listing is strictly one level deep; recursion is the orchestrator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FileKind, OperationResult, RemotePath, ServerStatus};

/// Properties of one entry in a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub remote_path: RemotePath,
    pub kind: FileKind,
    /// Content length; 0 for folders
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub mime_type: Option<String>,
    pub etag: Option<String>,
}

impl RemoteEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Result of listing one folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    /// The listed folder itself
    pub folder: RemoteEntry,
    /// Immediate children, in server order
    pub children: Vec<RemoteEntry>,
}

/// Port trait for listing remote folders
#[async_trait::async_trait]
pub trait IRemoteFolderLister: Send + Sync {
    /// Lists `path` and its immediate children
    ///
    /// # Errors
    /// Returns the classified result when the listing failed for any reason.
    async fn list_folder(&self, path: &RemotePath) -> Result<FolderListing, OperationResult>;
}

/// Port trait for querying server installation state
#[async_trait::async_trait]
pub trait IServerInfo: Send + Sync {
    /// Fetches the server status
    ///
    /// # Errors
    /// Returns the classified result when the status could not be fetched.
    async fn server_status(&self) -> Result<ServerStatus, OperationResult>;
}
