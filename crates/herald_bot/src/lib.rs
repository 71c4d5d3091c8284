//! Posting orchestrator, scheduler and metrics API for Herald.
//!
//! The [`Orchestrator`] runs one posting cycle at a time: claim a queued
//! item or create a new post or thread, call the generators, post with
//! bounded retries, and record the outcome. Every outbound call passes
//! through a [`DependencyGuard`], which enforces the dependency's rate
//! budget and circuit breaker before the call and records the result after
//! it.
//!
//! The [`Scheduler`] drives cycles, engagement refreshes and
//! [`HealthMonitor`] checks on their intervals until shutdown, and
//! [`create_router`] exposes health and [`HeraldMetrics`] over HTTP.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod guard;
mod health;
mod metrics;
mod orchestrator;
mod scheduler;
mod shutdown;
mod status;
mod trend_cache;

pub use api::{ApiState, create_router, serve};
pub use config::{
    ApiConfig, ContentConfig, Credentials, DatabaseConfig, EngagementConfig, HealthConfig,
    HeraldConfig, ImageConfig, TOPIC_PLACEHOLDER, ThreadsConfig, TrendsConfig,
};
pub use guard::{Admission, CallError, DependencyGuard};
pub use health::{HealthCheck, HealthMonitor, HealthReport, HealthStatus};
pub use metrics::{DependencySnapshot, HeraldMetrics, MetricsSnapshot};
pub use orchestrator::{CycleReport, Orchestrator, OrchestratorBuilder};
pub use scheduler::{Scheduler, SchedulerExit};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
pub use status::{DependencyStatus, StatusReport};
pub use trend_cache::TrendCache;
