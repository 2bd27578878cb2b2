use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sectionnav_core::NavConfig;

mod commands;

#[derive(Parser)]
#[command(name = "sectionnav")]
#[command(author, version, about = "Keep page sections and the URL fragment in sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/sectionnav/config.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run navigation scenarios against a simulated page
    Run {
        /// Scenario files (TOML)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a URL fragment against the known sections
    Check {
        /// Fragment, with or without the leading '#'
        hash: String,
        /// Comma-separated section ids in page order (defaults to sections.known)
        #[arg(short = 's', long, value_delimiter = ',')]
        sections: Vec<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.unwrap_or_else(NavConfig::config_path);
    let config = NavConfig::load_from(&config_path)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Run { files, json } => commands::run::run(&config, &files, json).await,
        Commands::Check { hash, sections } => commands::check::run(&config, &hash, sections),
        Commands::Config { write } => commands::config::run(&config, &config_path, write),
    }
}
