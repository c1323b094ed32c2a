//! Server status check (`status.php`)

use ocsync_core::{
    domain::{OperationResult, RawOutcome, ResultCode, ServerStatus},
    ports::IServerInfo,
};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{client::WebdavClient, failure::failure_result};

/// Body of `status.php`
#[derive(Debug, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    installed: bool,
    #[serde(default)]
    maintenance: bool,
    version: Option<String>,
    #[serde(rename = "versionstring")]
    version_string: Option<String>,
}

impl From<StatusDocument> for ServerStatus {
    fn from(doc: StatusDocument) -> Self {
        Self {
            installed: doc.installed,
            maintenance: doc.maintenance,
            version: doc.version,
            version_string: doc.version_string,
        }
    }
}

/// Parses a `status.php` body
///
/// # Errors
/// Returns a `BadOcVersion` result when the body is not a status document;
/// servers that answer with something else are not ownCloud instances we
/// can sync against.
pub fn parse_status(body: &str) -> Result<ServerStatus, OperationResult> {
    serde_json::from_str::<StatusDocument>(body)
        .map(ServerStatus::from)
        .map_err(|e| {
            OperationResult::from_code(ResultCode::BadOcVersion)
                .with_cause(format!("unparsable status document: {e}"))
        })
}

#[async_trait::async_trait]
impl IServerInfo for WebdavClient {
    async fn server_status(&self) -> Result<ServerStatus, OperationResult> {
        let secure = self.is_secure();
        let url = self.status_url();
        debug!(url = %url, "Checking server status");

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| failure_result(&e, secure))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| failure_result(&e, secure))?;

        if !status.is_success() {
            let result = OperationResult::from_outcome(
                RawOutcome::Response {
                    success: false,
                    status: status.as_u16(),
                },
                secure,
            );
            warn!(status = status.as_u16(), "{}", result.log_message());
            return Err(result);
        }

        let server = parse_status(&body).map_err(|r| r.with_secure(secure))?;
        debug!(
            installed = server.installed,
            version = server.version.as_deref().unwrap_or("-"),
            "Server status"
        );
        Ok(server)
    }
}
