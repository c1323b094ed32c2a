//! ownCloud WebDAV client
//!
//! Provides an authenticated HTTP client for a single ownCloud account.
//! Handles basic authentication, timeouts and URL construction for WebDAV
//! resources and the `status.php` endpoint.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ocsync_core::domain::RemotePath;
//! use ocsync_core::ports::IRemoteFolderLister;
//! use ocsync_webdav::client::WebdavClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = WebdavClient::new("https://cloud.example.com", "/remote.php/webdav")?
//!     .with_credentials("alice", "app-password");
//! match client.list_folder(&RemotePath::root()).await {
//!     Ok(listing) => println!("{} entries", listing.children.len()),
//!     Err(result) => println!("listing failed: {}", result.log_message()),
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use ocsync_core::{config::Config, domain::RemotePath};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::WebdavError;

/// Default connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// User agent sent with every request
const USER_AGENT: &str = concat!("ocsync/", env!("CARGO_PKG_VERSION"));

/// Basic-auth credentials
#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// WebdavClient
// ============================================================================

/// HTTP client for one ownCloud account
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct WebdavClient {
    /// The underlying HTTP client
    client: Client,
    /// Server base URL, without trailing slash
    server_url: String,
    /// WebDAV root URL, without trailing slash
    webdav_url: String,
    /// URL path of the WebDAV root, used to relativize listing hrefs
    webdav_prefix: String,
    credentials: Option<Credentials>,
}

impl WebdavClient {
    /// Creates a client with default timeouts
    ///
    /// # Arguments
    /// * `server_url` - Base URL of the server, e.g. `https://cloud.example.com`
    /// * `webdav_path` - WebDAV endpoint path, e.g. `/remote.php/webdav`
    ///
    /// # Errors
    /// Returns [`WebdavError::InvalidUrl`] if the resulting URL is not a valid
    /// http(s) URL.
    pub fn new(server_url: &str, webdav_path: &str) -> Result<Self, WebdavError> {
        Self::with_timeouts(
            server_url,
            webdav_path,
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Creates a client with explicit timeouts
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn with_timeouts(
        server_url: &str,
        webdav_path: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, WebdavError> {
        let server_url = server_url.trim_end_matches('/').to_string();
        let webdav_url = format!("{}{}", server_url, webdav_path.trim_end_matches('/'));

        let parsed = Url::parse(&webdav_url)
            .map_err(|e| WebdavError::InvalidUrl(format!("{webdav_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(WebdavError::InvalidUrl(format!(
                "{webdav_url}: scheme must be http or https"
            )));
        }
        // Listing hrefs are compared after decoding, so the prefix is too.
        let webdav_prefix = urlencoding::decode(parsed.path())
            .map_err(|e| WebdavError::InvalidUrl(format!("{webdav_url}: {e}")))?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(WebdavError::ClientBuild)?;

        debug!(webdav_url = %webdav_url, "Created WebDAV client");

        Ok(Self {
            client,
            server_url,
            webdav_url,
            webdav_prefix,
            credentials: None,
        })
    }

    /// Creates a client from the `server` and `network` config sections
    ///
    /// The password is taken from the environment first (see
    /// [`Config::resolve_password`]).
    ///
    /// # Errors
    /// Returns an error if the configured URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self, WebdavError> {
        let client = Self::with_timeouts(
            &config.server.url,
            &config.server.webdav_path,
            Duration::from_secs(config.network.connect_timeout_secs),
            Duration::from_secs(config.network.request_timeout_secs),
        )?;

        Ok(match config.resolve_password() {
            Some(password) => client.with_credentials(&config.server.username, password),
            None => client,
        })
    }

    /// Sets the basic-auth credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// WebDAV root URL, without trailing slash
    pub fn webdav_url(&self) -> &str {
        &self.webdav_url
    }

    /// URL path of the WebDAV root, e.g. `/remote.php/webdav`
    pub fn webdav_prefix(&self) -> &str {
        &self.webdav_prefix
    }

    /// True when requests go over TLS
    pub fn is_secure(&self) -> bool {
        self.webdav_url.starts_with("https://")
    }

    /// Absolute URL of a WebDAV resource
    pub fn resource_url(&self, path: &RemotePath) -> String {
        format!("{}{}", self.webdav_url, encode_path(path))
    }

    /// Absolute URL of the server status document
    pub fn status_url(&self) -> String {
        format!("{}/status.php", self.server_url)
    }

    /// Creates an authenticated request builder for an absolute URL
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, PUT, PROPFIND, etc.)
    /// * `url` - Absolute URL, usually from [`Self::resource_url`]
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }
}

/// Percent-encodes every segment of a remote path, keeping the separators
///
/// The root encodes to `/`.
pub fn encode_path(path: &RemotePath) -> String {
    if path.is_root() {
        return "/".to_string();
    }
    path.as_str()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
