//! ocsync WebDAV - ownCloud server client
//!
//! Provides async client for:
//! - Single-level folder listings (`PROPFIND`, `Depth: 1`)
//! - Server installation / version checks (`status.php`)
//! - Chunked uploads using the `OC-Chunked` protocol
//!
//! Every network outcome is returned as a classified
//! [`OperationResult`](ocsync_core::domain::OperationResult); reqwest errors
//! never leave this crate.
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and URL construction
//! - [`failure`] - Translation of reqwest errors into transport failures
//! - [`propfind`] - Folder listings and multistatus parsing
//! - [`status`] - Server status check
//! - [`upload`] - Chunked file upload

pub mod client;
pub mod failure;
pub mod propfind;
pub mod status;
pub mod upload;

use std::path::PathBuf;

use ocsync_core::domain::DomainError;
use thiserror::Error;

pub use client::WebdavClient;
pub use upload::ChunkedUploader;

/// Errors raised before any request is sent
///
/// Network failures are not errors at this level; they are reported as
/// classified operation results.
#[derive(Debug, Error)]
pub enum WebdavError {
    /// The configured server URL cannot be used
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The local file to upload cannot be opened or inspected
    #[error("Cannot read upload source {path}: {source}")]
    Source {
        /// Path of the local file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A domain precondition was violated (e.g., zero chunk size)
    #[error(transparent)]
    Domain(#[from] DomainError),
}
