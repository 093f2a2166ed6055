//! Main entry point for the chatglass CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// chatglass CLI
#[derive(Parser)]
#[command(name = "chatglass")]
#[command(about = "Offline tooling for the chatglass overlay engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the chatglass CLI
#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded protocol event fixture through the engine
    Replay {
        /// Path to the fixture, one JSON event per line (`-` for stdin)
        events: PathBuf,

        /// Path to the configuration file (optional)
        #[arg(
            long,
            short,
            help = "Path to the configuration file (e.g., overlay.toml or overlay.json). If not provided, defaults will be used."
        )]
        config: Option<PathBuf>,

        /// Path to the persisted state file
        #[arg(
            long,
            help = "Path to the persisted state file. Defaults to the platform data directory."
        )]
        state: Option<PathBuf>,

        /// Run on a volatile in-memory store instead of a state file
        #[arg(long, help = "Skip persistence entirely; nothing is written to disk.")]
        no_state: bool,
    },

    /// Validate a configuration file and print the resolved settings
    Check {
        /// Path to the configuration file (optional)
        #[arg(
            long,
            short,
            help = "Path to the configuration file to validate. If not provided, defaults plus environment overrides are checked."
        )]
        config: Option<PathBuf>,
    },

    /// Generate a default configuration file
    Config {
        /// Format of the configuration file to generate (toml or json). Defaults to toml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (toml or json). Defaults to toml."
        )]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            events,
            config,
            state,
            no_state,
        } => commands::replay::run(&events, config.as_deref(), state, no_state).await,
        Commands::Check { config } => commands::config::check(config.as_deref()),
        Commands::Config { format } => {
            commands::config::generate(format.as_deref().unwrap_or("toml"))
        }
    }
}
