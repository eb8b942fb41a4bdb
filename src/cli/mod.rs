//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(about = "Forensic image analysis with streamed hypothesis generation")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Show database and engine status
    Status,

    /// Start the web server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:8500)
        #[arg(default_value = "127.0.0.1:8500")]
        bind: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.data_dir).await;

    match cli.command {
        Commands::Init => commands::cmd_init(&settings).await,
        Commands::Status => commands::cmd_status(&settings).await,
        Commands::Serve { bind } => commands::cmd_serve(&settings, &bind).await,
    }
}
