//! Periodic driver for posting cycles, engagement refreshes and health
//! checks.

use crate::{HealthMonitor, Orchestrator, ShutdownSignal};
use herald_core::CycleOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, interval_at};
use tracing::{error, info, instrument, warn};

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// Shutdown was requested
    Shutdown,
    /// A dependency rejected our credentials
    Halted,
}

/// Runs one cycle per interval until shutdown or an auth failure.
///
/// Engagement refreshes and health checks run on their own intervals
/// between cycles when configured.
#[derive(Debug)]
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    engagement: Option<Duration>,
    health: Option<(Arc<HealthMonitor>, Duration)>,
}

/// A ticker whose first tick comes one period from now.
fn delayed_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Wait for the next tick; never completes without a ticker.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Scheduler {
    /// Schedule `orchestrator` every `interval`. The first cycle runs
    /// immediately.
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval: interval.max(Duration::from_millis(1)),
            engagement: None,
            health: None,
        }
    }

    /// Refresh engagement counters every `interval`. A zero interval
    /// disables the refresh.
    pub fn with_engagement(mut self, interval: Duration) -> Self {
        self.engagement = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Run `monitor` every `interval`. A zero interval disables the check.
    pub fn with_health(mut self, monitor: Arc<HealthMonitor>, interval: Duration) -> Self {
        self.health = (!interval.is_zero()).then_some((monitor, interval));
        self
    }

    /// Run until `shutdown` fires or a cycle halts.
    ///
    /// Cycle errors are logged and counted, then the loop continues. Ticks
    /// missed while a cycle runs are skipped, not replayed.
    #[instrument(skip_all, fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(&self, shutdown: ShutdownSignal) -> SchedulerExit {
        info!(
            engagement = self.engagement.is_some(),
            health = self.health.is_some(),
            "Scheduler started"
        );
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut engagement_ticker = self.engagement.map(delayed_ticker);
        let mut health_ticker = self.health.as_ref().map(|(_, period)| delayed_ticker(*period));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopping");
                    return SchedulerExit::Shutdown;
                }
                _ = next_tick(&mut engagement_ticker) => {
                    if let Err(e) = self.orchestrator.refresh_engagement(&shutdown).await {
                        warn!(error = %e, "Engagement refresh failed");
                    }
                    continue;
                }
                _ = next_tick(&mut health_ticker) => {
                    if let Some((monitor, _)) = &self.health {
                        monitor.check().await;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match self.orchestrator.run_cycle(&shutdown).await {
                Ok(report) => match report.outcome() {
                    CycleOutcome::Halted => {
                        error!(
                            dependency = ?report.dependency(),
                            error = ?report.error(),
                            "Credentials rejected, scheduling halted until restart"
                        );
                        return SchedulerExit::Halted;
                    }
                    CycleOutcome::Cancelled => {
                        info!("Cycle cancelled, scheduler stopping");
                        return SchedulerExit::Shutdown;
                    }
                    _ => {}
                },
                Err(e) => {
                    warn!(error = %e, "Cycle failed");
                    self.orchestrator.metrics().record_cycle_error();
                }
            }
        }
    }
}
