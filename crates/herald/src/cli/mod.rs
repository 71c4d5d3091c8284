//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the herald binary.

mod commands;
mod run;
mod status;

pub use commands::{Cli, Commands, OutputFormat};
pub use run::{run_bot, run_once};
pub use status::{check_config, show_status};
