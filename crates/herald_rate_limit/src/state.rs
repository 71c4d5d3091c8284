//! Per-dependency state unit.

use crate::{CircuitBreaker, DependencyLimits, RateBudget};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use herald_core::Dependency;
use serde::{Deserialize, Serialize};

/// Budget and breaker for one dependency, versioned for compare-and-swap.
///
/// `version` is the value observed when the state was read. A store accepts
/// a write only if its stored version still matches, then bumps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct DependencyState {
    /// Which dependency this is
    dependency: Dependency,
    /// Call budget
    budget: RateBudget,
    /// Breaker
    circuit: CircuitBreaker,
    /// Optimistic concurrency version, 0 for never stored
    version: u64,
}

impl DependencyState {
    /// Fresh state derived from configured limits.
    pub fn new(dependency: Dependency, limits: &DependencyLimits, now: DateTime<Utc>) -> Self {
        Self {
            dependency,
            budget: RateBudget::new(*limits.max_calls(), limits.window(), now),
            circuit: CircuitBreaker::new(&limits.circuit_policy()),
            version: 0,
        }
    }

    /// Rebuild state read back from storage.
    pub fn from_parts(
        dependency: Dependency,
        budget: RateBudget,
        circuit: CircuitBreaker,
        version: u64,
    ) -> Self {
        Self {
            dependency,
            budget,
            circuit,
            version,
        }
    }

    /// Mutable access to the budget.
    pub fn budget_mut(&mut self) -> &mut RateBudget {
        &mut self.budget
    }

    /// Mutable access to the breaker.
    pub fn circuit_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.circuit
    }

    /// Copy of this state as a store returns it after a successful write.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Apply limits that may have changed since the state was stored.
    pub fn reconcile(&mut self, limits: &DependencyLimits) {
        if *self.budget.max_calls() != *limits.max_calls()
            || *self.budget.window_duration() != limits.window()
        {
            self.budget.reconfigure(*limits.max_calls(), limits.window());
        }
    }
}
