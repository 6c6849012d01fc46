//! quotesync CLI
//!
//! Command-line tools for the quotation sync engine.
//!
//! # Commands
//!
//! - `simulate` - Run a scripted two-session scenario against an in-process server
//! - `inspect-draft` - Decode a persisted draft
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::simulate::Scenario;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// quotesync command-line tools.
#[derive(Parser)]
#[command(name = "quotesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two sessions against an in-process server and print each transition
    Simulate {
        /// Scenario to run
        #[arg(short, long, value_enum, default_value_t = Scenario::Conflict)]
        scenario: Scenario,

        /// Resolution strategy (keep-local, keep-server, merge, cancel)
        #[arg(long, default_value = "keep-local")]
        strategy: String,
    },

    /// Decode a persisted draft
    InspectDraft {
        /// Draft directory
        #[arg(short, long)]
        path: PathBuf,

        /// Document id
        #[arg(short, long)]
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate { scenario, strategy } => {
            let strategy = strategy.parse()?;
            commands::simulate::run(scenario, strategy)?;
        }
        Commands::InspectDraft { path, id, format } => {
            let id = id.parse()?;
            commands::inspect_draft::run(&path, &id, &format)?;
        }
        Commands::Version => {
            println!("quotesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
