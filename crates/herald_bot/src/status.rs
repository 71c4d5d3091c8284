//! Point-in-time view of dependencies and recent work, for `herald status`.

use crate::DependencyGuard;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use herald_core::{ContentItem, CycleRecord, Dependency};
use herald_error::HeraldResult;
use herald_interface::AnalyticsStore;
use herald_rate_limit::CircuitPhase;
use serde::Serialize;
use std::fmt;
use strum::IntoEnumIterator;

/// Budget and breaker of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct DependencyStatus {
    /// Which dependency
    dependency: Dependency,
    /// Breaker phase
    phase: CircuitPhase,
    /// Failures since the last success
    consecutive_failures: u32,
    /// When an open breaker admits a trial call
    cooldown_until: Option<DateTime<Utc>>,
    /// Calls reserved in the current window
    calls_used: u32,
    /// Calls allowed per window
    max_calls: u32,
    /// End of the current window
    window_resets_at: Option<DateTime<Utc>>,
}

/// Everything `herald status` prints.
#[derive(Debug, Clone, Serialize, Getters)]
pub struct StatusReport {
    /// When the report was taken
    generated_at: DateTime<Utc>,
    /// One entry per dependency
    dependencies: Vec<DependencyStatus>,
    /// Most recently created items
    recent_items: Vec<ContentItem>,
    /// Most recent cycles
    recent_cycles: Vec<CycleRecord>,
}

impl StatusReport {
    /// Collect the state of every dependency and the last `limit` items and
    /// cycles.
    pub async fn collect(
        guard: &DependencyGuard,
        store: &dyn AnalyticsStore,
        now: DateTime<Utc>,
        limit: usize,
    ) -> HeraldResult<Self> {
        let mut dependencies = Vec::new();
        for dependency in Dependency::iter() {
            let state = guard.state(dependency).await?;
            let budget = state.budget();
            let circuit = state.circuit();
            let elapsed = budget.window_elapsed(now);
            dependencies.push(DependencyStatus {
                dependency,
                phase: *circuit.phase(),
                consecutive_failures: *circuit.consecutive_failures(),
                cooldown_until: *circuit.cooldown_until(),
                calls_used: if elapsed { 0 } else { *budget.calls_used() },
                max_calls: *budget.max_calls(),
                window_resets_at: if elapsed { None } else { budget.window_end() },
            });
        }

        Ok(Self {
            generated_at: now,
            dependencies,
            recent_items: store.recent_items(limit).await?,
            recent_cycles: store.recent_cycles(limit).await?,
        })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependencies ({}):", self.generated_at.to_rfc3339())?;
        for dep in &self.dependencies {
            write!(
                f,
                "  {:<18} {:<10} failures={} budget={}/{}",
                dep.dependency.to_string(),
                dep.phase.to_string(),
                dep.consecutive_failures,
                dep.calls_used,
                dep.max_calls,
            )?;
            if let Some(until) = dep.cooldown_until {
                write!(f, " cooldown_until={}", until.to_rfc3339())?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Recent items:")?;
        if self.recent_items.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for item in &self.recent_items {
            writeln!(
                f,
                "  {} {:<7} {} {}",
                item.id(),
                item.status().to_string(),
                item.updated_at().to_rfc3339(),
                item.platform_post_id().as_deref().unwrap_or("-"),
            )?;
        }

        writeln!(f, "Recent cycles:")?;
        if self.recent_cycles.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for cycle in &self.recent_cycles {
            writeln!(
                f,
                "  {} {:<9} {}",
                cycle.started_at().to_rfc3339(),
                cycle.outcome().to_string(),
                cycle.error().as_deref().unwrap_or(""),
            )?;
        }
        Ok(())
    }
}
