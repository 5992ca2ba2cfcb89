//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.
//! Every command that touches the Drive goes through [`Session::open`], which
//! loads the configuration and builds the resolver.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use gd_core::{Config, ConfigManager, NodeCache, Resolver};
use gd_drive::DriveClient;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod completions;
mod ls;
mod stat;

/// gd - path-style access to a remote Drive
///
/// Addresses are `gd://folder/sub/name` paths (segments may use `*` and `?`),
/// `gd:<id>` or `gd:root`, and shared `https://drive.google.com` links.
#[derive(Parser, Debug)]
#[command(name = "gd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress spinner
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// OAuth access token for the Drive API
    #[arg(long, global = true, env = "GD_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List files and folders
    Ls(ls::LsArgs),

    /// Show what an address resolves to
    Stat(stat::StatArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Ls(args) => ls::execute(args, cli.token, output_config).await,
        Commands::Stat(args) => stat::execute(args, cli.token, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Loaded configuration plus a resolver bound to the Drive
pub(crate) struct Session {
    pub config: Config,
    pub resolver: Resolver,
}

impl Session {
    /// Load the configuration and connect, reporting failures through `formatter`
    pub fn open(token: Option<String>, formatter: &Formatter) -> Result<Self, ExitCode> {
        let config = ConfigManager::new()
            .and_then(|manager| manager.load())
            .map_err(|e| {
                formatter.error(&format!("Failed to load configuration: {e}"));
                ExitCode::from(&e)
            })?;

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            formatter.error("No access token: pass --token or set GD_ACCESS_TOKEN");
            return Err(ExitCode::AuthError);
        };

        let client = DriveClient::new(&config.drive, token).map_err(|e| {
            formatter.error(&format!("Failed to create Drive client: {e}"));
            ExitCode::from(&e)
        })?;

        let resolver = Resolver::new(Arc::new(client), Arc::new(NodeCache::new()));
        Ok(Self { config, resolver })
    }
}
