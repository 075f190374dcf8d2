//! Syncboard CLI
//!
//! Command-line interface for Syncboard - sync status control for
//! remotely-synchronized data sources.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod backend;
mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "syncboard")]
#[command(about = "Syncboard - sync status control for data sources")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current sync status of one or more data sources
    Status {
        /// Data source ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Trigger a sync and follow it to a terminal status
    Sync {
        /// Data source id
        id: String,
        /// Trigger without waiting for the outcome
        #[arg(long)]
        no_wait: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, api_key, poll_interval_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        Commands::Status { ids } => commands::status::show(ids, &output).await,
        Commands::Sync { id, no_wait } => commands::sync::run(id, no_wait, &output).await,
        Commands::Config { command } => handle_config_command(command, &output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}
