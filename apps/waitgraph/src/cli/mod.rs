//! # waitgraph CLI Module
//!
//! This module implements the CLI interface for the daemon.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server (default)
//! - `replay` - Run a scenario script against a fresh graph
//! - `config` - Print the effective configuration

mod commands;

use crate::config::DaemonConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use waitgraph_core::WaitGraphError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// waitgraph - Global deadlock detector
///
/// Collects the wait-for edges reported by every node of a cluster and
/// answers whether a transaction is deadlocked.
#[derive(Parser, Debug)]
#[command(name = "waitgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Replay a JSON scenario script against a fresh graph
    Replay {
        /// Path to the script file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), WaitGraphError> {
    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            config.apply_overrides(host, port);
            cmd_server(&config).await
        }
        Some(Commands::Replay { file }) => cmd_replay(&config, &file, json_mode, cli.verbose),
        Some(Commands::Config) => cmd_config(&config, json_mode),
        None => cmd_server(&config).await,
    }
}

// =============================================================================
// TESTS
// =============================================================================
