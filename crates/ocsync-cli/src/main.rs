//! ocsync CLI - Command-line client for ownCloud servers
//!
//! Provides commands for:
//! - Synchronizing the remote folder tree into the local file records
//! - Uploading files with the chunked upload protocol
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod notifier;
mod output;

use commands::{config::ConfigCommand, sync::SyncCommand, upload::UploadCommand, AppContext};
use ocsync_core::config::Config;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "ocsync", version, about = "Synchronization client for ownCloud")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize the remote folder tree
    Sync(SyncCommand),
    /// Upload a file in chunks
    Upload(UploadCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Log filter from the flags, falling back to the configured level
    fn log_filter(&self, config: &Config) -> String {
        if self.quiet {
            return "warn".to_string();
        }
        match self.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

fn init_tracing(filter: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    init_tracing(&cli.log_filter(&config), config.logging.json);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = AppContext {
        config_path,
        config,
        format,
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
