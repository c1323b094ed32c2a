//! Config command - View and manage ocsync configuration
//!
//! Provides the `ocsync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON) with the password hidden
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file location

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use ocsync_core::config::Config;

use super::AppContext;

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("server.url", "Server base URL"),
    ("server.webdav_path", "WebDAV endpoint path"),
    ("server.username", "Account name"),
    ("server.password", "Password or app token (\"none\" clears it)"),
    ("sync.root", "Remote folder the sync starts from"),
    ("sync.check_server_version", "true|false"),
    ("upload.chunk_size_bytes", "Upload chunk size in bytes"),
    ("network.connect_timeout_secs", "Connection timeout"),
    ("network.request_timeout_secs", "Whole-request timeout"),
    ("storage.database", "SQLite database file"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.json", "true|false"),
];

const REDACTED: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "upload.chunk_size_bytes")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => {
                let formatter = ctx.format.formatter();
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "config_path": ctx.config_path.display().to_string(),
                        "exists": ctx.config_path.exists(),
                    }));
                } else {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
        }
    }

    fn execute_show(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.format.formatter();
        let config = redacted(&ctx.config);

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
        Ok(())
    }

    fn execute_set(&self, ctx: &AppContext, key: &str, value: &str) -> Result<()> {
        let formatter = ctx.format.formatter();
        let mut config = ctx.config.clone();

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if !ctx.format.is_json() {
                formatter.info("Supported keys:");
                for (key, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {key:<30} {description}"));
                }
            }
            return Err(e);
        }

        // Only the changed section has to be valid; the file may still be
        // half written.
        let section = key.split('.').next().unwrap_or_default();
        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field.split('.').next() == Some(section))
            .map(ToString::to_string)
            .collect();
        if !errors.is_empty() {
            anyhow::bail!("Invalid value for '{key}': {}", errors.join("; "));
        }

        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(&ctx.config_path, yaml).context("Failed to write configuration file")?;
        info!(key, config_path = %ctx.config_path.display(), "Configuration value set");

        let shown = if key == "server.password" { REDACTED } else { value };
        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": shown,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {key} = {shown}"));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.format.formatter();
        let path = &ctx.config_path;

        // Parse errors are reported, not hidden behind the defaults.
        let config = if path.exists() {
            Config::load(path)
                .with_context(|| format!("Failed to parse configuration {}", path.display()))?
        } else {
            formatter.warn(&format!(
                "Configuration file not found at {}, validating defaults",
                path.display()
            ));
            Config::default()
        };

        let errors = config.validate();
        if ctx.format.is_json() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path.display().to_string(),
                "errors": messages,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Configuration is invalid")
        }
    }
}

/// Copy of `config` that is safe to print
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.server.password.is_some() {
        config.server.password = Some(REDACTED.to_string());
    }
    config
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => anyhow::bail!("Expected true or false for {key}"),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("Expected a positive integer for {key}"))
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- server ---
        "server.url" => config.server.url = value.to_string(),
        "server.webdav_path" => config.server.webdav_path = value.to_string(),
        "server.username" => config.server.username = value.to_string(),
        "server.password" => {
            config.server.password = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }

        // --- sync ---
        "sync.root" => config.sync.root = value.to_string(),
        "sync.check_server_version" => {
            config.sync.check_server_version = parse_bool(key, value)?;
        }

        // --- upload / network ---
        "upload.chunk_size_bytes" => config.upload.chunk_size_bytes = parse_u64(key, value)?,
        "network.connect_timeout_secs" => {
            config.network.connect_timeout_secs = parse_u64(key, value)?;
        }
        "network.request_timeout_secs" => {
            config.network.request_timeout_secs = parse_u64(key, value)?;
        }

        // --- storage / logging ---
        "storage.database" => config.storage.database = PathBuf::from(value),
        "logging.level" => config.logging.level = value.to_string(),
        "logging.json" => config.logging.json = parse_bool(key, value)?,

        _ => anyhow::bail!("Unknown configuration key: '{key}'"),
    }
    Ok(())
}
