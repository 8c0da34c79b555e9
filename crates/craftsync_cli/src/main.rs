//! craftsync CLI
//!
//! Command-line tools for inspecting a craftsync store.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and metadata
//! - `queue` - List pending mutations in push order
//! - `verify` - Check store and queue consistency
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// craftsync command-line store tools.
#[derive(Parser)]
#[command(name = "craftsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List pending mutations in push order
    Queue {
        /// Maximum number of items to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check store and queue consistency
    Verify {
        /// Check stored records
        #[arg(short, long)]
        records: bool,

        /// Check the mutation queue
        #[arg(short, long)]
        queue: bool,

        /// Check all (default if no flags specified)
        #[arg(short, long)]
        all: bool,
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
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Queue { limit, format } => {
            let path = cli.path.ok_or("Store path required for queue")?;
            commands::queue::run(&path, limit, &format)?;
        }
        Commands::Verify {
            records,
            queue,
            all,
        } => {
            let path = cli.path.ok_or("Store path required for verify")?;
            let check_all = all || (!records && !queue);
            commands::verify::run(&path, records || check_all, queue || check_all)?;
        }
        Commands::Version => {
            println!("craftsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("craftsync Engine v{}", craftsync_engine::VERSION);
        }
    }

    Ok(())
}
