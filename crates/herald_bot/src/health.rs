//! Periodic health check of the stores and circuit breakers.

use crate::{DependencyGuard, HeraldMetrics};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use herald_core::{Clock, Dependency};
use herald_interface::AnalyticsStore;
use serde::Serialize;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, instrument, warn};

/// Overall or per-check health, ordered from best to worst.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    /// Everything answered
    Healthy,
    /// A dependency's circuit is open; cycles skip it until it cools down
    Degraded,
    /// A store could not be read
    Unhealthy,
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct HealthCheck {
    /// What was checked
    name: String,
    /// How it went
    status: HealthStatus,
    /// Error or circuit detail
    detail: Option<String>,
}

impl HealthCheck {
    fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            detail: None,
        }
    }

    fn with_status(name: impl Into<String>, status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: Some(detail.into()),
        }
    }
}

/// Every result from one health check, served at `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct HealthReport {
    /// Worst status among the checks
    status: HealthStatus,
    /// Individual checks
    checks: Vec<HealthCheck>,
    /// When the check ran
    checked_at: DateTime<Utc>,
}

/// Checks the analytics store, the dependency state store and every
/// dependency's breaker.
///
/// External services are not called; an open circuit is how the bot
/// learns a dependency is down.
#[derive(Clone)]
pub struct HealthMonitor {
    analytics: Arc<dyn AnalyticsStore>,
    guard: DependencyGuard,
    clock: Arc<dyn Clock>,
    metrics: HeraldMetrics,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    /// Monitor `analytics` and the state behind `guard`.
    pub fn new(
        analytics: Arc<dyn AnalyticsStore>,
        guard: DependencyGuard,
        clock: Arc<dyn Clock>,
        metrics: HeraldMetrics,
    ) -> Self {
        Self {
            analytics,
            guard,
            clock,
            metrics,
        }
    }

    /// Run every check and count the result.
    #[instrument(skip(self))]
    pub async fn check(&self) -> HealthReport {
        let now = self.clock.now();
        let mut checks = Vec::new();

        checks.push(match self.analytics.recent_items(1).await {
            Ok(_) => HealthCheck::healthy("analytics_store"),
            Err(e) => HealthCheck::with_status("analytics_store", HealthStatus::Unhealthy, e.to_string()),
        });

        let mut state_store_error = None;
        for dependency in Dependency::iter() {
            match self.guard.state(dependency).await {
                Ok(state) => {
                    let circuit = state.circuit();
                    checks.push(if circuit.is_open_at(now) {
                        let until = circuit
                            .cooldown_until()
                            .map(|until| until.to_rfc3339())
                            .unwrap_or_default();
                        HealthCheck::with_status(
                            dependency.as_ref(),
                            HealthStatus::Degraded,
                            format!("circuit open until {until}"),
                        )
                    } else {
                        HealthCheck::healthy(dependency.as_ref())
                    });
                }
                Err(e) => {
                    state_store_error = Some(e.to_string());
                    break;
                }
            }
        }
        checks.push(match state_store_error {
            None => HealthCheck::healthy("dependency_state_store"),
            Some(e) => HealthCheck::with_status("dependency_state_store", HealthStatus::Unhealthy, e),
        });

        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        self.metrics.record_health(status);

        match status {
            HealthStatus::Healthy => info!("Health check passed"),
            _ => {
                let failing: Vec<&str> = checks
                    .iter()
                    .filter(|check| check.status != HealthStatus::Healthy)
                    .map(|check| check.name.as_str())
                    .collect();
                warn!(%status, ?failing, "Health check found problems");
            }
        }

        HealthReport {
            status,
            checks,
            checked_at: now,
        }
    }
}
