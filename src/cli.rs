//! Command line interface

use crate::server::{self, AppConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "tally.toml";

/// Tally - LLM gateway with usage and cost accounting
#[derive(Debug, Parser)]
#[command(name = "tally", version, about)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Write a default configuration file
    Init,
}

/// Run the parsed command
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = AppConfig::load(&config_path)?;
            server::run(config).await
        }
        Command::Init => {
            let config = AppConfig::default();
            config.save(&config_path)?;
            info!("Wrote default configuration to {}", config_path.display());
            Ok(())
        }
    }
}
