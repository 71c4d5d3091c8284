//! `herald run` and `herald cycle`.

use super::OutputFormat;
use crate::wiring::{build_orchestrator, open_stores};
use herald_bot::{
    ApiState, CycleReport, Credentials, HeraldConfig, HeraldMetrics, Scheduler, SchedulerExit,
    ShutdownTrigger, serve, shutdown_channel,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Trigger shutdown on Ctrl+C.
fn shutdown_on_ctrl_c(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        trigger.trigger();
    });
}

/// Run the scheduler, and the metrics API when enabled, until interrupted.
#[instrument(skip_all)]
pub async fn run_bot(config_path: Option<&Path>, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = HeraldConfig::load(config_path)?;
    let credentials = Credentials::from_env();
    let stores = open_stores(&config, &credentials)?;
    let metrics = HeraldMetrics::new()?;
    let orchestrator = Arc::new(build_orchestrator(
        &config,
        &credentials,
        &stores,
        metrics.clone(),
        dry_run,
    )?);

    let (trigger, shutdown) = shutdown_channel();
    shutdown_on_ctrl_c(trigger.clone());

    let health = Arc::new(orchestrator.health_monitor());

    let api = if *config.api().enabled() {
        let bind = config.api().bind().clone();
        let state = ApiState::new(metrics.clone()).with_health(Arc::clone(&health));
        let signal = trigger.signal();
        Some(tokio::spawn(async move { serve(&bind, state, signal).await }))
    } else {
        None
    };

    info!(
        interval_minutes = config.cycle_interval_minutes(),
        dry_run, "Herald starting"
    );
    let mut scheduler = Scheduler::new(orchestrator, config.cycle_interval());
    if *config.engagement().enabled() {
        scheduler = scheduler.with_engagement(config.engagement().interval());
    }
    if *config.health().enabled() {
        scheduler = scheduler.with_health(health, config.health().interval());
    }
    let exit = scheduler.run(shutdown).await;

    // Stop the API with the scheduler.
    trigger.trigger();
    if let Some(api) = api {
        match api.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Metrics API failed"),
            Err(e) => error!(error = %e, "Metrics API task panicked"),
        }
    }

    match exit {
        SchedulerExit::Shutdown => {
            info!("Herald stopped");
            Ok(())
        }
        SchedulerExit::Halted => {
            Err("scheduling halted: a dependency rejected its credentials".into())
        }
    }
}

/// Run a single cycle, or replay one item, and print the report.
#[instrument(skip_all)]
pub async fn run_once(
    config_path: Option<&Path>,
    dry_run: bool,
    item: Option<Uuid>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = HeraldConfig::load(config_path)?;
    let credentials = Credentials::from_env();
    let stores = open_stores(&config, &credentials)?;
    let orchestrator =
        build_orchestrator(&config, &credentials, &stores, HeraldMetrics::new()?, dry_run)?;

    let (trigger, shutdown) = shutdown_channel();
    shutdown_on_ctrl_c(trigger);

    let report = match item {
        Some(id) => orchestrator.resume(id, &shutdown).await?,
        None => orchestrator.run_cycle(&shutdown).await?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("Outcome: {}", report.outcome());
    if let Some(dependency) = report.dependency() {
        println!("Dependency: {dependency}");
    }
    if let Some(error) = report.error() {
        println!("Error: {error}");
    }
    if report.thread().is_empty() {
        if let Some(item) = report.item() {
            println!("Item: {} ({})", item.id(), item.status());
            println!("Text: {}", item.text());
            if let Some(post_id) = item.platform_post_id() {
                println!("Post: {post_id}");
            }
        }
    }
    for part in report.thread() {
        println!(
            "Part {}: {} ({}){}",
            part.thread_position() + 1,
            part.id(),
            part.status(),
            part.platform_post_id()
                .as_ref()
                .map(|post_id| format!(" post {post_id}"))
                .unwrap_or_default()
        );
        println!("  {}", part.text());
    }
    for attempt in report.attempts() {
        println!(
            "Attempt {}: {}{}",
            attempt.attempt_number(),
            attempt.outcome(),
            attempt
                .error()
                .as_ref()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );
    }
}
