//! Configuration module for ocsync.
//!
//! Settings for the server account, the sync walk, chunked uploads, the HTTP
//! transport, the record database and logging. Read from YAML; every field
//! has a default so partial files are fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::CHUNK_SIZE;

/// Environment variable that overrides `server.password`.
pub const PASSWORD_ENV_VAR: &str = "OCSYNC_PASSWORD";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ocsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub upload: UploadConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Server account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server, e.g. `https://cloud.example.com`.
    pub url: String,
    /// WebDAV endpoint path appended to `url`.
    pub webdav_path: String,
    pub username: String,
    /// Plain password or app token. Prefer the `OCSYNC_PASSWORD` variable.
    pub password: Option<String>,
}

/// Tree walk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote folder the tree walk starts from.
    pub root: String,
    /// Query `status.php` before walking the tree.
    pub check_server_version: bool,
}

/// Chunked upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Size of each upload chunk in bytes.
    pub chunk_size_bytes: u64,
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

/// Local metadata store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database: PathBuf,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing or broken file yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Where the configuration lives unless `--config` says otherwise.
    ///
    /// Typically `$XDG_CONFIG_HOME/ocsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ocsync")
            .join("config.yaml")
    }

    /// Full WebDAV base URL (`server.url` + `server.webdav_path`), without a
    /// trailing slash.
    pub fn webdav_url(&self) -> String {
        format!(
            "{}{}",
            self.server.url.trim_end_matches('/'),
            self.server.webdav_path.trim_end_matches('/')
        )
    }

    /// Password from the environment, falling back to the config file.
    pub fn resolve_password(&self) -> Option<String> {
        std::env::var(PASSWORD_ENV_VAR)
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| self.server.password.clone())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            webdav_path: "/remote.php/webdav".to_string(),
            username: String::new(),
            password: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            check_server_version: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: CHUNK_SIZE,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("ocsync");
        Self {
            database: data_dir.join("ocsync.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// One problem found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"upload.chunk_size_bytes"`.
    pub field: String,
    /// What is wrong with the value.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accepted `logging.level` values.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Checks every section.
    ///
    /// Every problem is reported, not only the first; empty means usable.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        if self.server.url.is_empty() {
            errors.push(ValidationError {
                field: "server.url".into(),
                message: "must be set".into(),
            });
        } else if let Err(e) = url::Url::parse(&self.server.url) {
            errors.push(ValidationError {
                field: "server.url".into(),
                message: format!("not a valid URL: {e}"),
            });
        } else if !(self.server.url.starts_with("http://")
            || self.server.url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "server.url".into(),
                message: "scheme must be http or https".into(),
            });
        }
        if !self.server.webdav_path.starts_with('/') {
            errors.push(ValidationError {
                field: "server.webdav_path".into(),
                message: "must start with '/'".into(),
            });
        }
        if self.server.username.is_empty() {
            errors.push(ValidationError {
                field: "server.username".into(),
                message: "must be set".into(),
            });
        }

        // --- sync ---
        if crate::domain::RemotePath::new(self.sync.root.clone()).is_err() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("invalid remote path '{}'", self.sync.root),
            });
        }

        // --- upload ---
        if self.upload.chunk_size_bytes == 0 {
            errors.push(ValidationError {
                field: "upload.chunk_size_bytes".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- network ---
        if self.network.connect_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "network.connect_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.network.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "network.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "unknown level '{}', expected one of {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Programmatic construction of a [`Config`], mostly for tests and embedders.
///
/// Unset fields keep their [`Config::default`] values.
///
/// # Example
///
/// ```rust,no_run
/// use ocsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .server_url("https://cloud.example.com")
///     .server_username("alice")
///     .upload_chunk_size_bytes(512 * 1024)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Builder holding the defaults.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.url = url.into();
        self
    }

    pub fn server_webdav_path(mut self, path: impl Into<String>) -> Self {
        self.config.server.webdav_path = path.into();
        self
    }

    pub fn server_username(mut self, username: impl Into<String>) -> Self {
        self.config.server.username = username.into();
        self
    }

    pub fn server_password(mut self, password: impl Into<String>) -> Self {
        self.config.server.password = Some(password.into());
        self
    }

    // --- sync ---

    pub fn sync_root(mut self, root: impl Into<String>) -> Self {
        self.config.sync.root = root.into();
        self
    }

    pub fn sync_check_server_version(mut self, check: bool) -> Self {
        self.config.sync.check_server_version = check;
        self
    }

    // --- upload ---

    pub fn upload_chunk_size_bytes(mut self, bytes: u64) -> Self {
        self.config.upload.chunk_size_bytes = bytes;
        self
    }

    // --- network ---

    pub fn network_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.network.connect_timeout_secs = secs;
        self
    }

    pub fn network_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.network.request_timeout_secs = secs;
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Finished configuration, unvalidated.
    pub fn build(self) -> Config {
        self.config
    }

    /// Builds, then validates. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
