//! `herald status` and `herald check-config`.

use super::OutputFormat;
use crate::wiring::open_stores;
use herald_bot::{Credentials, DependencyGuard, HeraldConfig, HeraldMetrics, StatusReport};
use herald_core::{Clock, SystemClock};
use std::path::Path;
use std::sync::Arc;

/// Print dependency states and recent activity.
pub async fn show_status(
    config_path: Option<&Path>,
    limit: usize,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = HeraldConfig::load(config_path)?;
    let credentials = Credentials::from_env();
    let stores = open_stores(&config, &credentials)?;
    let clock = Arc::new(SystemClock);
    let guard = DependencyGuard::new(
        Arc::clone(&stores.states),
        config.dependencies().clone(),
        clock.clone(),
        HeraldMetrics::new()?,
    );

    let report = StatusReport::collect(&guard, stores.analytics.as_ref(), clock.now(), limit).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => print!("{report}"),
    }
    Ok(())
}

/// Print configuration warnings; fail when credentials are missing.
pub fn check_config(config_path: Option<&Path>, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = HeraldConfig::load(config_path)?;
    let credentials = Credentials::from_env();

    let warnings = config.validate();
    let missing = credentials.missing(&config, dry_run);

    for warning in &warnings {
        println!("warning: {warning}");
    }
    for credential in &missing {
        println!("error: {credential}");
    }

    if !missing.is_empty() {
        return Err(format!("{} required credential(s) missing", missing.len()).into());
    }
    if warnings.is_empty() {
        println!("Configuration OK");
    }
    Ok(())
}
