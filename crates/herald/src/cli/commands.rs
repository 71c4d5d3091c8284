//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

/// Herald - automated social posting with rate limits and circuit breakers
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Automated social posting with rate limits and circuit breakers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the bundled defaults
    #[arg(short, long, global = true, env = "HERALD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run posting cycles on the configured interval until interrupted
    Run {
        /// Log posts instead of publishing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run exactly one posting cycle
    Cycle {
        /// Log posts instead of publishing them
        #[arg(long)]
        dry_run: bool,

        /// Replay the posting step for this item instead of a full cycle
        #[arg(long)]
        item: Option<Uuid>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Validate configuration and credentials
    CheckConfig {
        /// Do not require platform credentials
        #[arg(long)]
        dry_run: bool,
    },

    /// Show dependency states and recent items
    Status {
        /// Maximum number of items and cycles to display
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// JSON
    Json,
}
