//! Cameraman CLI
//!
//! Usage:
//!   cameraman serve [OPTIONS]     Serve the recording API
//!   cameraman cameras [OPTIONS]   Probe every configured camera
//!   cameraman check [OPTIONS]     Validate configuration and environment

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cameraman",
    about = "Record network camera streams on demand",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the recording API until interrupted
    Serve {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overrides the configured one
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Probe every configured camera
    Cameras {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration, output directory, and capture program
    Check {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => commands::serve::run(config, bind, cli.verbose).await,
        Commands::Cameras { config, json } => {
            commands::cameras::run(config, json, cli.verbose).await
        }
        Commands::Check { config } => commands::check::run(config, cli.verbose),
    }
}
