//! Admission control and bookkeeping around outbound calls.
//!
//! The guard owns no state of its own. Every budget and breaker lives in a
//! [`DependencyStateStore`]; each mutation is a read-modify-write retried on
//! version conflicts, so workers sharing a store never double-spend a
//! budget.

use crate::{HeraldMetrics, ShutdownSignal};
use chrono::{DateTime, Utc};
use herald_core::{Clock, Dependency};
use herald_error::{
    Classify, DatabaseError, DatabaseErrorKind, FailureClass, HeraldError, HeraldResult,
};
use herald_interface::DependencyStateStore;
use herald_rate_limit::{DependencyLimits, DependencyLimitsSet, DependencyState, RetryPolicy};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};

const MAX_CAS_ATTEMPTS: u32 = 16;

/// Whether a dependency may be called right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed
    Allowed,
    /// The breaker is open
    CircuitOpen {
        /// When a trial call will be admitted
        until: Option<DateTime<Utc>>,
    },
    /// The window's budget is spent
    BudgetExhausted {
        /// When the window resets
        resets_at: Option<DateTime<Utc>>,
    },
}

impl Admission {
    /// Whether the call may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Why a guarded call produced no value.
#[derive(Debug, derive_more::Display)]
pub enum CallError {
    /// Short-circuited by an open breaker; nothing was sent
    #[display("circuit open")]
    CircuitOpen,
    /// Denied by the local budget; nothing was sent
    #[display("rate budget exhausted")]
    BudgetExhausted,
    /// The dependency failed or timed out
    #[display("{} failure: {}", class, message)]
    Failed {
        /// Failure class
        class: FailureClass,
        /// Error text
        message: String,
    },
    /// Shutdown interrupted the call; its result was discarded
    #[display("cancelled")]
    Cancelled,
    /// Dependency state could not be read or written
    #[display("{}", _0)]
    Store(HeraldError),
}

impl CallError {
    /// The failure class an attempt record should carry, if any.
    ///
    /// An open breaker reads as a synthetic transient error and a local
    /// budget denial as rate limited.
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            CallError::CircuitOpen => Some(FailureClass::Transient),
            CallError::BudgetExhausted => Some(FailureClass::RateLimited),
            CallError::Failed { class, .. } => Some(*class),
            CallError::Cancelled | CallError::Store(_) => None,
        }
    }

    /// Whether another attempt may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Failed { class, .. } if class.is_retryable())
    }

    /// Wrap for a `tokio_retry2` action: retryable failures are transient,
    /// everything else is permanent.
    pub fn into_retry(self) -> RetryError<CallError> {
        if self.is_retryable() {
            RetryError::transient(self)
        } else {
            RetryError::permanent(self)
        }
    }
}

impl From<HeraldError> for CallError {
    fn from(err: HeraldError) -> Self {
        CallError::Store(err)
    }
}

/// Enforces rate budgets and circuit breakers for every dependency.
#[derive(Clone)]
pub struct DependencyGuard {
    store: Arc<dyn DependencyStateStore>,
    limits: DependencyLimitsSet,
    clock: Arc<dyn Clock>,
    metrics: HeraldMetrics,
}

impl std::fmt::Debug for DependencyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGuard")
            .field("limits", &self.limits)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl DependencyGuard {
    /// Create a guard over `store`.
    pub fn new(
        store: Arc<dyn DependencyStateStore>,
        limits: DependencyLimitsSet,
        clock: Arc<dyn Clock>,
        metrics: HeraldMetrics,
    ) -> Self {
        Self {
            store,
            limits,
            clock,
            metrics,
        }
    }

    /// Configured limits.
    pub fn limits(&self) -> &DependencyLimitsSet {
        &self.limits
    }

    /// Current state for `dependency`, fresh if never stored.
    pub async fn state(&self, dependency: Dependency) -> HeraldResult<DependencyState> {
        self.current(dependency, self.clock.now()).await
    }

    async fn current(
        &self,
        dependency: Dependency,
        now: DateTime<Utc>,
    ) -> HeraldResult<DependencyState> {
        let limits = self.limits.for_dependency(dependency);
        let state = match self.store.load(dependency).await? {
            Some(mut state) => {
                state.reconcile(limits);
                state
            }
            None => DependencyState::new(dependency, limits, now),
        };
        Ok(state)
    }

    /// Read-modify-write `dependency`'s state, retrying version conflicts.
    async fn update<T>(
        &self,
        dependency: Dependency,
        mut mutate: impl FnMut(&mut DependencyState, DateTime<Utc>, &DependencyLimits) -> T + Send,
    ) -> HeraldResult<T> {
        let limits = self.limits.for_dependency(dependency);
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let now = self.clock.now();
            let mut state = self.current(dependency, now).await?;
            let output = mutate(&mut state, now, limits);
            match self.store.compare_and_swap(&state).await? {
                Some(saved) => {
                    self.metrics
                        .set_circuit_phase(dependency, *saved.circuit().phase());
                    return Ok(output);
                }
                None => {
                    debug!(%dependency, attempt, "Dependency state changed underneath, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }
        Err(DatabaseError::new(DatabaseErrorKind::VersionConflict {
            key: dependency.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
        .into())
    }

    fn evaluate(state: &DependencyState, now: DateTime<Utc>) -> Admission {
        if state.circuit().is_open_at(now) {
            Admission::CircuitOpen {
                until: *state.circuit().cooldown_until(),
            }
        } else if !state.budget().has_capacity(now) {
            Admission::BudgetExhausted {
                resets_at: state.budget().window_end(),
            }
        } else {
            Admission::Allowed
        }
    }

    /// Whether `dependency` would be admitted now, without reserving.
    pub async fn check(&self, dependency: Dependency) -> HeraldResult<Admission> {
        let now = self.clock.now();
        let state = self.current(dependency, now).await?;
        Ok(Self::evaluate(&state, now))
    }

    /// Admit one call to `dependency` and reserve a slot in its budget.
    ///
    /// An open breaker whose cool-down passed moves to half-open here.
    pub async fn reserve(&self, dependency: Dependency) -> HeraldResult<Admission> {
        self.update(dependency, |state, now, _| {
            if !state.circuit_mut().admit(now) {
                return Admission::CircuitOpen {
                    until: *state.circuit().cooldown_until(),
                };
            }
            if !state.budget_mut().try_consume(now) {
                return Admission::BudgetExhausted {
                    resets_at: state.budget().window_end(),
                };
            }
            Admission::Allowed
        })
        .await
    }

    /// Record a successful call.
    pub async fn record_success(&self, dependency: Dependency) -> HeraldResult<()> {
        self.update(dependency, |state, _, limits| {
            state.circuit_mut().record_success(&limits.circuit_policy());
        })
        .await
    }

    /// Record a failed call.
    ///
    /// Remote throttling also spends the rest of the window's budget.
    pub async fn record_failure(
        &self,
        dependency: Dependency,
        class: FailureClass,
    ) -> HeraldResult<()> {
        self.update(dependency, |state, now, limits| {
            if class == FailureClass::RateLimited {
                state.budget_mut().exhaust(now);
            }
            if class.trips_circuit() {
                state
                    .circuit_mut()
                    .record_failure(now, &limits.circuit_policy());
            }
        })
        .await
    }

    /// Make one guarded call to `dependency`.
    ///
    /// The call is admitted and reserved first, then raced against the
    /// dependency's timeout and `shutdown`. A timeout is a transient
    /// failure. On cancellation the result is discarded and the breaker is
    /// left untouched.
    #[instrument(skip(self, shutdown, call))]
    pub async fn call<T, E, F, Fut>(
        &self,
        dependency: Dependency,
        shutdown: &ShutdownSignal,
        call: F,
    ) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        match self.reserve(dependency).await? {
            Admission::Allowed => {}
            Admission::CircuitOpen { until } => {
                debug!(?until, "Circuit open, call short-circuited");
                return Err(CallError::CircuitOpen);
            }
            Admission::BudgetExhausted { resets_at } => {
                info!(?resets_at, "Rate budget exhausted, call not made");
                self.metrics.record_rate_limited(dependency);
                return Err(CallError::BudgetExhausted);
            }
        }

        self.metrics.record_attempt(dependency);
        let timeout = self.limits.for_dependency(dependency).timeout();

        let result = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, abandoning call");
                return Err(CallError::Cancelled);
            }
            result = tokio::time::timeout(timeout, call()) => result,
        };

        let (class, message) = match result {
            Ok(Ok(value)) => {
                self.record_success(dependency).await?;
                self.metrics.record_success(dependency);
                return Ok(value);
            }
            Ok(Err(err)) => (err.failure_class(), err.to_string()),
            Err(_) => (
                FailureClass::Transient,
                format!("timed out after {}s", timeout.as_secs_f64()),
            ),
        };

        warn!(%class, error = %message, "Dependency call failed");
        self.record_failure(dependency, class).await?;
        self.metrics.record_failure(dependency, class);
        Err(CallError::Failed { class, message })
    }

    /// Make a guarded call, retrying transient failures per `retry`.
    ///
    /// Only transient [`CallError::Failed`] results are retried; a
    /// short-circuit, a budget denial or any other class ends the schedule.
    /// The whole schedule, backoff sleeps included, is raced against
    /// `shutdown`.
    #[instrument(skip(self, retry, shutdown, call))]
    pub async fn call_with_retry<T, E, F, Fut>(
        &self,
        dependency: Dependency,
        retry: &RetryPolicy,
        shutdown: &ShutdownSignal,
        call: F,
    ) -> Result<T, CallError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let call = &call;
        let action = move || async move {
            self.call(dependency, shutdown, call)
                .await
                .map_err(CallError::into_retry)
        };

        tokio::select! {
            _ = shutdown.cancelled() => Err(CallError::Cancelled),
            result = Retry::spawn_notify(retry.delays(0), action, log_retry) => result,
        }
    }
}

/// Backoff notification for [`Retry::spawn_notify`].
pub(crate) fn log_retry(err: &CallError, waited: Duration) {
    debug!(error = %err, waited_ms = waited.as_millis() as u64, "Retrying after transient failure");
}
