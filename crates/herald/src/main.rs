//! Herald CLI binary.
//!
//! This binary runs the posting bot:
//! - `run` schedules posting cycles and serves metrics
//! - `cycle` runs one cycle or replays one item
//! - `check-config` validates configuration and credentials
//! - `status` shows dependency states and recent items

use clap::Parser;

mod cli;
mod observability;
mod wiring;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, check_config, run_bot, run_once, show_status};
    use observability::{ObservabilityConfig, init_observability};

    // Parse command-line arguments
    let cli = Cli::parse();

    init_observability(&ObservabilityConfig::new(cli.verbose, cli.json_logs))?;

    let config_path = cli.config.as_deref();

    // Execute the requested command
    match cli.command {
        Commands::Run { dry_run } => {
            run_bot(config_path, dry_run).await?;
        }

        Commands::Cycle {
            dry_run,
            item,
            format,
        } => {
            run_once(config_path, dry_run, item, format).await?;
        }

        Commands::CheckConfig { dry_run } => {
            check_config(config_path, dry_run)?;
        }

        Commands::Status { limit, format } => {
            show_status(config_path, limit, format).await?;
        }
    }

    Ok(())
}
