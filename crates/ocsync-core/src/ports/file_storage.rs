//! File storage port (driven/secondary port)
//!
//! This module defines the interface for persisting the local records of
//! remote files and folders.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, in-memory, etc.) and don't need domain-level classification.
//! - Records are keyed by remote path; [`FileId`] is the stable handle
//!   used for parent/child links.
//! - `remove` on a folder removes its whole subtree.
//! - `apply_folder` is all-or-nothing: a folder sync that fails halfway
//!   leaves no trace.

use crate::domain::{newtypes::FileId, RemoteFile, RemotePath};

/// Port trait for the local file metadata store
#[async_trait::async_trait]
pub trait IFileStorage: Send + Sync {
    /// Looks up a record by its remote path
    async fn get_by_path(&self, path: &RemotePath) -> anyhow::Result<Option<RemoteFile>>;

    /// Lists the records whose parent is `folder_id`
    async fn children_of(&self, folder_id: &FileId) -> anyhow::Result<Vec<RemoteFile>>;

    /// Saves a record (insert or update by id)
    async fn save(&self, file: &RemoteFile) -> anyhow::Result<()>;

    /// Removes a record
    ///
    /// # Arguments
    /// * `file` - Record to remove; folders take their descendants with them
    /// * `also_local_content` - Also delete downloaded content from disk
    async fn remove(&self, file: &RemoteFile, also_local_content: bool) -> anyhow::Result<()>;

    /// Applies the result of one folder synchronization as a single unit
    ///
    /// Removals run before saves, so a record may be replaced by a new one at
    /// the same path. Local content is deleted only once every change is
    /// stored.
    ///
    /// # Arguments
    /// * `saves` - Records to insert or update by id
    /// * `removals` - Records to remove, each with its subtree
    /// * `also_local_content` - Also delete downloaded content of removed files
    ///
    /// # Errors
    /// On error none of the changes are stored.
    async fn apply_folder(
        &self,
        saves: &[RemoteFile],
        removals: &[RemoteFile],
        also_local_content: bool,
    ) -> anyhow::Result<()>;
}
