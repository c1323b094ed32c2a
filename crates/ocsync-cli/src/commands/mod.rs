//! CLI subcommands

use std::path::PathBuf;

use anyhow::Result;
use ocsync_core::config::Config;

use crate::output::OutputFormat;

pub mod config;
pub mod sync;
pub mod upload;

/// Shared state handed to every command
pub struct AppContext {
    /// File the configuration was read from (it may not exist)
    pub config_path: PathBuf,
    pub config: Config,
    pub format: OutputFormat,
}

impl AppContext {
    /// Fails with every validation error if the configuration can't be used
    /// to reach the server
    pub fn require_valid_config(&self) -> Result<()> {
        let errors = self.config.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!(
            "Invalid configuration in {}: {}",
            self.config_path.display(),
            details.join("; ")
        )
    }
}
