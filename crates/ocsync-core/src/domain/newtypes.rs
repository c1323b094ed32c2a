//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    DomainError::InvalidId(format!("{} '{s}': {e}", stringify!($name)))
                })
            }
        }
    };
}

uuid_id! {
    /// Local identifier of a file or folder record
    ///
    /// Assigned the first time an entry is observed in a remote listing and
    /// preserved across later listings of the same remote path.
    FileId
}

uuid_id! {
    /// Identifier of one sync session
    SessionId
}

// ============================================================================
// Remote paths
// ============================================================================

/// A path on the server, relative to the WebDAV root (must start with /)
///
/// Folder hrefs returned by the server carry a trailing slash; it is
/// stripped on construction so `/Photos/` and `/Photos` are the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Validates and normalizes a server path
    ///
    /// A single trailing slash is dropped. Every other segment must be
    /// non-empty and must not be `.` or `..`.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidRemotePath`] naming the first problem.
    pub fn new(path: String) -> Result<Self, DomainError> {
        let Some(rest) = path.strip_prefix('/') else {
            return Err(DomainError::InvalidRemotePath(format!(
                "'{path}' is not absolute"
            )));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }

        for segment in rest.split('/') {
            let problem = match segment {
                "" => "empty segment",
                "." | ".." => "relative segment",
                _ => continue,
            };
            return Err(DomainError::InvalidRemotePath(format!("'{path}': {problem}")));
        }

        Ok(Self(format!("/{rest}")))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns true for "/"
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Containing folder; `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (head, _) = self.0.rsplit_once('/').filter(|_| !self.is_root())?;
        Some(if head.is_empty() {
            Self::root()
        } else {
            Self(head.to_string())
        })
    }

    /// Last segment; `None` for the root
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(_, name)| name).filter(|n| !n.is_empty())
    }

    /// Returns true if `other` lies strictly below this path
    #[must_use]
    pub fn is_ancestor_of(&self, other: &RemotePath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other
            .0
            .strip_prefix(&self.0)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}
