//! RemoteFile domain entity
//!
//! A [`RemoteFile`] is the local record of one file or folder on the server.
//! Records are created and refreshed from folder listings and removed when a
//! later listing of their parent no longer reports them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{FileId, RemotePath};

/// Mime type the server reports for folders
pub const DIRECTORY_MIME_TYPE: &str = "DIR";

/// Kind of a remote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Directory => "directory",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(FileKind::File),
            "directory" => Ok(FileKind::Directory),
            other => Err(format!("unknown file kind: {other}")),
        }
    }
}

/// Local record of a remote file or folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Local identity, stable across listings
    pub id: FileId,
    /// Path relative to the WebDAV root, unique per account
    pub remote_path: RemotePath,
    /// Containing folder; `None` only for the root
    pub parent_id: Option<FileId>,
    pub kind: FileKind,
    /// Content length in bytes; always 0 for folders
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub mime_type: Option<String>,
    pub etag: Option<String>,
    /// Where the content was downloaded to; never set for folders
    pub local_path: Option<PathBuf>,
    /// User asked for this file to be kept up to date locally
    pub keep_in_sync: bool,
    /// Timestamp of the last sync session whose listing reported this entry
    pub last_sync: Option<DateTime<Utc>>,
}

impl RemoteFile {
    /// Creates a record for a newly observed entry with a fresh [`FileId`]
    pub fn new(remote_path: RemotePath, kind: FileKind) -> Self {
        let mime_type = match kind {
            FileKind::Directory => Some(DIRECTORY_MIME_TYPE.to_string()),
            FileKind::File => None,
        };
        Self {
            id: FileId::new(),
            remote_path,
            parent_id: None,
            kind,
            size: 0,
            modified: None,
            mime_type,
            etag: None,
            local_path: None,
            keep_in_sync: false,
            last_sync: None,
        }
    }

    /// Creates the record for the account root folder
    pub fn root() -> Self {
        Self::new(RemotePath::root(), FileKind::Directory)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// True when the content has been downloaded
    pub fn is_down(&self) -> bool {
        !self.is_directory() && self.local_path.is_some()
    }

    /// File name component, `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        self.remote_path.file_name()
    }

    /// True when this record was not reported by the listing of session `ts`
    pub fn is_stale(&self, session_ts: DateTime<Utc>) -> bool {
        self.last_sync.map_or(true, |seen| seen < session_ts)
    }
}
