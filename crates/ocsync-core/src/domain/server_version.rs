//! Server version and installation status
//!
//! The server publishes its state at `status.php`. Before a sync session the
//! orchestrator can check that the server is installed and recent enough;
//! [`ServerStatus::verdict`] turns the answer into an [`OperationResult`].

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::result::{OperationResult, ResultCode};

/// Oldest server release the client talks to
pub const MIN_SERVER_VERSION: ServerVersion = ServerVersion::new(4, 0, 0);

/// Dotted server version, compared component-wise
///
/// Only the first three components are significant; `10.0.3.3` parses as
/// `10.0.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    /// True when this version is at least [`MIN_SERVER_VERSION`]
    pub fn is_supported(&self) -> bool {
        *self >= MIN_SERVER_VERSION
    }
}

impl FromStr for ServerVersion {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidVersion(s.to_string()));
        }

        let mut parts = [0u32; 3];
        for (slot, piece) in parts.iter_mut().zip(trimmed.split('.')) {
            *slot = piece
                .parse()
                .map_err(|_| DomainError::InvalidVersion(s.to_string()))?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Display for ServerVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Installation state reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub installed: bool,
    pub maintenance: bool,
    /// Raw `version` field
    pub version: Option<String>,
    /// Human-readable `versionstring` field
    pub version_string: Option<String>,
}

impl ServerStatus {
    /// Parsed version, if the server reported a valid one
    pub fn parsed_version(&self) -> Option<ServerVersion> {
        self.version.as_deref().and_then(|v| v.parse().ok())
    }

    /// Decide whether a sync may proceed against this server
    ///
    /// # Returns
    /// * `InstanceNotConfigured` when the server is not installed
    /// * `BadOcVersion` when the version is missing, unparsable or too old
    /// * `Ok` otherwise
    pub fn verdict(&self) -> OperationResult {
        if !self.installed {
            return OperationResult::from_code(ResultCode::InstanceNotConfigured);
        }
        match self.parsed_version() {
            Some(version) if version.is_supported() => OperationResult::ok(),
            Some(version) => OperationResult::from_code(ResultCode::BadOcVersion)
                .with_cause(format!("server version {version} is below {MIN_SERVER_VERSION}")),
            None => OperationResult::from_code(ResultCode::BadOcVersion),
        }
    }
}
