//! KVBridge CLI
//!
//! Command-line tools for exercising the KVBridge replication bridge.
//!
//! # Commands
//!
//! - `simulate` - Run a multi-node in-memory replication simulation
//! - `replay` - Show a peer reconnecting and replaying from a timestamp

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// KVBridge command-line replication tools.
#[derive(Parser)]
#[command(name = "kvbridge")]
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
    /// Run a multi-node in-memory replication simulation
    Simulate {
        /// Number of nodes
        #[arg(short, long, default_value = "3")]
        nodes: usize,

        /// Number of local writes across all nodes
        #[arg(short, long, default_value = "1000")]
        writes: usize,

        /// Number of local deletes across all nodes
        #[arg(short, long, default_value = "100")]
        deletes: usize,

        /// Number of distinct keys
        #[arg(short, long, default_value = "256")]
        keys: usize,

        /// Seed for the random workload
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Maximum pump rounds before giving up
        #[arg(long, default_value = "64")]
        max_rounds: usize,
    },

    /// Show a peer reconnecting and replaying changes from a timestamp
    Replay {
        /// Replay changes at or after this timestamp
        #[arg(short, long, default_value = "300")]
        from: i64,

        /// Number of changes to generate
        #[arg(short, long, default_value = "5")]
        count: usize,
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
        Commands::Simulate {
            nodes,
            writes,
            deletes,
            keys,
            seed,
            max_rounds,
        } => {
            let options = commands::simulate::SimulateOptions {
                nodes,
                writes,
                deletes,
                keys,
                seed,
                max_rounds,
            };
            commands::simulate::run(&options)?;
        }
        Commands::Replay { from, count } => {
            commands::replay::run(from, count)?;
        }
        Commands::Version => {
            println!("KVBridge CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("KVBridge Core v{}", kvbridge_core::VERSION);
        }
    }

    Ok(())
}
