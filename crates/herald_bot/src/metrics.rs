//! Prometheus metrics for dependency calls, posting cycles, health checks
//! and engagement.

use crate::HealthStatus;
use herald_core::{CycleOutcome, Dependency, PostEngagement};
use herald_error::{FailureClass, HeraldResult, ServerError, ServerErrorKind};
use herald_rate_limit::CircuitPhase;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGaugeVec, Registry, TextEncoder,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_vec_with_registry,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Label values of the `herald_engagement` gauge.
const ENGAGEMENT_KINDS: [&str; 4] = ["impressions", "likes", "reposts", "replies"];

fn metrics_error(err: prometheus::Error) -> ServerError {
    ServerError::new(ServerErrorKind::Metrics(err.to_string()))
}

/// Counters and gauges exported at `/metrics`.
///
/// Cloning shares the underlying collectors.
#[derive(Debug, Clone)]
pub struct HeraldMetrics {
    registry: Registry,
    calls_attempted: Arc<IntCounterVec>,
    calls_succeeded: Arc<IntCounterVec>,
    calls_rate_limited: Arc<IntCounterVec>,
    calls_failed_transient: Arc<IntCounterVec>,
    calls_failed_permanent: Arc<IntCounterVec>,
    circuit_state: Arc<IntGaugeVec>,
    cycles: Arc<IntCounterVec>,
    cycle_errors: Arc<IntCounter>,
    health_checks: Arc<IntCounterVec>,
    engagement: Arc<IntGaugeVec>,
}

impl HeraldMetrics {
    /// Register every collector with a fresh registry.
    pub fn new() -> HeraldResult<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register every collector with `registry`.
    pub fn with_registry(registry: Registry) -> HeraldResult<Self> {
        let calls_attempted = register_int_counter_vec_with_registry!(
            "herald_calls_attempted_total",
            "Outbound calls that reached a dependency",
            &["dependency"],
            registry
        )
        .map_err(metrics_error)?;

        let calls_succeeded = register_int_counter_vec_with_registry!(
            "herald_calls_succeeded_total",
            "Outbound calls that succeeded",
            &["dependency"],
            registry
        )
        .map_err(metrics_error)?;

        let calls_rate_limited = register_int_counter_vec_with_registry!(
            "herald_calls_rate_limited_total",
            "Calls throttled by the dependency or denied by the local budget",
            &["dependency"],
            registry
        )
        .map_err(metrics_error)?;

        let calls_failed_transient = register_int_counter_vec_with_registry!(
            "herald_calls_failed_transient_total",
            "Calls that failed with a retryable error",
            &["dependency"],
            registry
        )
        .map_err(metrics_error)?;

        let calls_failed_permanent = register_int_counter_vec_with_registry!(
            "herald_calls_failed_permanent_total",
            "Calls that failed with a non-retryable or auth error",
            &["dependency"],
            registry
        )
        .map_err(metrics_error)?;

        let circuit_state = register_int_gauge_vec_with_registry!(
            "herald_circuit_state",
            "Circuit breaker phase: 0 closed, 1 half_open, 2 open",
            &["dependency"],
            registry
        )
        .map_err(metrics_error)?;

        let cycles = register_int_counter_vec_with_registry!(
            "herald_cycles_total",
            "Posting cycles by outcome",
            &["outcome"],
            registry
        )
        .map_err(metrics_error)?;

        let cycle_errors = register_int_counter_with_registry!(
            "herald_cycle_errors_total",
            "Cycles that ended with an unhandled error",
            registry
        )
        .map_err(metrics_error)?;

        let health_checks = register_int_counter_vec_with_registry!(
            "herald_health_checks_total",
            "Health checks by overall status",
            &["status"],
            registry
        )
        .map_err(metrics_error)?;

        let engagement = register_int_gauge_vec_with_registry!(
            "herald_engagement",
            "Engagement summed over posts refreshed in the lookback window",
            &["kind"],
            registry
        )
        .map_err(metrics_error)?;

        // Export every series from the start, not only after first use.
        for dependency in Dependency::iter() {
            let label = [dependency.as_ref()];
            calls_attempted.with_label_values(&label);
            calls_succeeded.with_label_values(&label);
            calls_rate_limited.with_label_values(&label);
            calls_failed_transient.with_label_values(&label);
            calls_failed_permanent.with_label_values(&label);
            circuit_state.with_label_values(&label).set(0);
        }
        for outcome in CycleOutcome::iter() {
            cycles.with_label_values(&[outcome.as_ref()]);
        }
        for status in HealthStatus::iter() {
            health_checks.with_label_values(&[status.as_ref()]);
        }
        for kind in ENGAGEMENT_KINDS {
            engagement.with_label_values(&[kind]).set(0);
        }

        Ok(Self {
            registry,
            calls_attempted: Arc::new(calls_attempted),
            calls_succeeded: Arc::new(calls_succeeded),
            calls_rate_limited: Arc::new(calls_rate_limited),
            calls_failed_transient: Arc::new(calls_failed_transient),
            calls_failed_permanent: Arc::new(calls_failed_permanent),
            circuit_state: Arc::new(circuit_state),
            cycles: Arc::new(cycles),
            cycle_errors: Arc::new(cycle_errors),
            health_checks: Arc::new(health_checks),
            engagement: Arc::new(engagement),
        })
    }

    /// The registry holding every collector.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A call is about to reach `dependency`.
    pub fn record_attempt(&self, dependency: Dependency) {
        self.calls_attempted
            .with_label_values(&[dependency.as_ref()])
            .inc();
    }

    /// A call to `dependency` succeeded.
    pub fn record_success(&self, dependency: Dependency) {
        self.calls_succeeded
            .with_label_values(&[dependency.as_ref()])
            .inc();
    }

    /// A call was throttled, remotely or by the local budget.
    pub fn record_rate_limited(&self, dependency: Dependency) {
        self.calls_rate_limited
            .with_label_values(&[dependency.as_ref()])
            .inc();
    }

    /// A call to `dependency` failed with `class`.
    pub fn record_failure(&self, dependency: Dependency, class: FailureClass) {
        let counter = match class {
            FailureClass::RateLimited => &self.calls_rate_limited,
            FailureClass::Transient => &self.calls_failed_transient,
            FailureClass::Permanent | FailureClass::Auth => &self.calls_failed_permanent,
        };
        counter.with_label_values(&[dependency.as_ref()]).inc();
    }

    /// Publish the breaker phase of `dependency`.
    pub fn set_circuit_phase(&self, dependency: Dependency, phase: CircuitPhase) {
        self.circuit_state
            .with_label_values(&[dependency.as_ref()])
            .set(phase.gauge_value());
    }

    /// A cycle finished with `outcome`.
    pub fn record_cycle(&self, outcome: CycleOutcome) {
        self.cycles.with_label_values(&[outcome.as_ref()]).inc();
    }

    /// A cycle ended with an error that escaped the orchestrator.
    pub fn record_cycle_error(&self) {
        self.cycle_errors.inc();
    }

    /// A health check finished with `status`.
    pub fn record_health(&self, status: HealthStatus) {
        self.health_checks.with_label_values(&[status.as_ref()]).inc();
    }

    /// Publish engagement totals over the refreshed posts.
    pub fn set_engagement<'a>(&self, posts: impl IntoIterator<Item = &'a PostEngagement>) {
        let mut totals = [0u64; 4];
        for post in posts {
            totals[0] += post.impressions();
            totals[1] += post.likes();
            totals[2] += post.reposts();
            totals[3] += post.replies();
        }
        for (kind, total) in ENGAGEMENT_KINDS.into_iter().zip(totals) {
            self.engagement
                .with_label_values(&[kind])
                .set(i64::try_from(total).unwrap_or(i64::MAX));
        }
    }

    /// Prometheus text exposition of every collector.
    pub fn encode(&self) -> HeraldResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        let text = String::from_utf8(buffer)
            .map_err(|e| ServerError::new(ServerErrorKind::Metrics(e.to_string())))?;
        Ok(text)
    }

    /// Serializable view of the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let dependencies = Dependency::iter()
            .map(|dependency| {
                let label = [dependency.as_ref()];
                let phase = self.circuit_state.with_label_values(&label).get();
                let snapshot = DependencySnapshot {
                    attempted: self.calls_attempted.with_label_values(&label).get(),
                    succeeded: self.calls_succeeded.with_label_values(&label).get(),
                    rate_limited: self.calls_rate_limited.with_label_values(&label).get(),
                    failed_transient: self.calls_failed_transient.with_label_values(&label).get(),
                    failed_permanent: self.calls_failed_permanent.with_label_values(&label).get(),
                    circuit_state: phase_name(phase).to_string(),
                };
                (dependency.to_string(), snapshot)
            })
            .collect();

        let cycles = CycleOutcome::iter()
            .map(|outcome| {
                let count = self.cycles.with_label_values(&[outcome.as_ref()]).get();
                (outcome.to_string(), count)
            })
            .collect();

        let health_checks = HealthStatus::iter()
            .map(|status| {
                let count = self.health_checks.with_label_values(&[status.as_ref()]).get();
                (status.to_string(), count)
            })
            .collect();

        let engagement = ENGAGEMENT_KINDS
            .into_iter()
            .map(|kind| (kind.to_string(), self.engagement.with_label_values(&[kind]).get()))
            .collect();

        MetricsSnapshot {
            dependencies,
            cycles,
            cycle_errors: self.cycle_errors.get(),
            health_checks,
            engagement,
        }
    }
}

fn phase_name(gauge: i64) -> &'static str {
    match gauge {
        0 => "closed",
        1 => "half_open",
        _ => "open",
    }
}

/// Serializable snapshot served at `/metrics/json`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Call counters and breaker phase per dependency
    pub dependencies: BTreeMap<String, DependencySnapshot>,
    /// Cycle counts per outcome
    pub cycles: BTreeMap<String, u64>,
    /// Cycles that ended in an error
    pub cycle_errors: u64,
    /// Health checks per overall status
    pub health_checks: BTreeMap<String, u64>,
    /// Engagement totals per kind
    pub engagement: BTreeMap<String, i64>,
}

/// Call counters for one dependency.
#[derive(Debug, Clone, Serialize)]
pub struct DependencySnapshot {
    /// Calls that reached the dependency
    pub attempted: u64,
    /// Successful calls
    pub succeeded: u64,
    /// Throttled calls, remote or local
    pub rate_limited: u64,
    /// Retryable failures
    pub failed_transient: u64,
    /// Non-retryable failures
    pub failed_permanent: u64,
    /// Breaker phase name
    pub circuit_state: String,
}
