//! Circuit breaker implementation

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::types::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState};
use crate::telemetry::{SharedObserver, TelemetryRecord, default_observer};

/// State machine with the data each state owns.
///
/// `opened_at` only exists in `Open` and `HalfOpen`, and the failure counter
/// only exists in `Closed`, so leaving `Closed` drops the count and entering
/// it starts from zero. `HalfOpen` is entered by the caller that claims the
/// trial, so being half-open means the trial is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { opened_at: Instant },
}

impl Phase {
    fn state(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    total_calls: u64,
    total_failures: u64,
    total_rejections: u64,
    last_failure: Option<Instant>,
}

/// What a caller was allowed to do when it entered the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    /// Closed circuit, ordinary call
    Normal,
    /// The single half-open probe
    Trial,
}

type Transition = (CircuitState, CircuitState);

/// Circuit breaker for protecting against failing dependencies
pub struct CircuitBreaker {
    /// Protected operation name (for logging and metrics)
    name: String,
    config: CircuitBreakerConfig,
    /// Every state read and transition happens under this lock; it is never
    /// held across an await point.
    inner: Mutex<Inner>,
    observer: SharedObserver,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom config
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed { failures: 0 },
                total_calls: 0,
                total_failures: 0,
                total_rejections: 0,
                last_failure: None,
            }),
            observer: default_observer(),
        }
    }

    /// Report transitions and rejections to a custom observer
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Get the protected operation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state.
    ///
    /// An open circuit whose reset timeout has elapsed still reports `Open`;
    /// the move to `HalfOpen` happens on the next call.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().phase.state()
    }

    /// Consecutive failures recorded while closed
    pub fn failure_count(&self) -> u32 {
        match self.inner.lock().phase {
            Phase::Closed { failures } => failures,
            _ => 0,
        }
    }

    /// When the circuit last opened, if it is open or half-open
    pub fn opened_at(&self) -> Option<Instant> {
        match self.inner.lock().phase {
            Phase::Closed { .. } => None,
            Phase::Open { opened_at } | Phase::HalfOpen { opened_at } => Some(opened_at),
        }
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// Any `Err` returned by the operation counts as a failure.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Execute an operation, letting `is_failure` decide which errors count
    /// against the circuit. Errors it rejects are still returned to the
    /// caller but are recorded as successful invocations.
    pub async fn call_classified<T, E, F, Fut, C>(
        &self,
        operation: F,
        is_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        let guard = self.enter()?;

        match operation().await {
            Ok(result) => {
                guard.complete(true);
                Ok(result)
            }
            Err(e) => {
                guard.complete(!is_failure(&e));
                Err(CircuitBreakerError::OperationFailed(e))
            }
        }
    }

    /// Execute an operation with a deadline. Running past the deadline counts
    /// as a failure and yields [`CircuitBreakerError::Timeout`].
    pub async fn call_with_timeout<T, E, F, Fut>(
        &self,
        timeout: Duration,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.enter()?;

        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(result)) => {
                guard.complete(true);
                Ok(result)
            }
            Ok(Err(e)) => {
                guard.complete(false);
                Err(CircuitBreakerError::OperationFailed(e))
            }
            Err(_) => {
                guard.complete(false);
                Err(CircuitBreakerError::Timeout {
                    name: self.name.clone(),
                    timeout,
                })
            }
        }
    }

    /// Get circuit breaker statistics
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        let (failure_count, opened_at) = match inner.phase {
            Phase::Closed { failures } => (failures, None),
            Phase::Open { opened_at } | Phase::HalfOpen { opened_at } => (0, Some(opened_at)),
        };
        CircuitBreakerStats {
            state: inner.phase.state(),
            failure_count,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
            opened_at,
            last_failure: inner.last_failure,
        }
    }

    /// Manually reset the circuit breaker to closed state
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            Self::move_to(&mut inner.phase, Phase::Closed { failures: 0 })
        };
        self.notify(transition);
    }

    /// Manually open the circuit breaker
    pub fn trip(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            Self::move_to(
                &mut inner.phase,
                Phase::Open {
                    opened_at: Instant::now(),
                },
            )
        };
        self.notify(transition);
    }

    /// Decide whether a call may proceed. Moving Open to HalfOpen and claiming
    /// the trial slot happen in the same critical section.
    fn enter<E>(&self) -> Result<CallGuard<'_>, CircuitBreakerError<E>> {
        let now = Instant::now();
        let (permit, transition, state) = {
            let mut inner = self.inner.lock();
            let mut transition = None;
            let permit = match inner.phase {
                Phase::Closed { .. } => Some(Permit::Normal),
                Phase::Open { opened_at }
                    if now.saturating_duration_since(opened_at) >= self.config.reset_timeout() =>
                {
                    transition = Self::move_to(&mut inner.phase, Phase::HalfOpen { opened_at });
                    Some(Permit::Trial)
                }
                Phase::Open { .. } | Phase::HalfOpen { .. } => None,
            };

            if permit.is_some() {
                inner.total_calls += 1;
            } else {
                inner.total_rejections += 1;
            }
            (permit, transition, inner.phase.state())
        };
        self.notify(transition);

        match permit {
            Some(permit) => Ok(CallGuard {
                breaker: self,
                permit,
                completed: false,
            }),
            None => {
                self.observer.record(&TelemetryRecord::BreakerRejected {
                    breaker: self.name.clone(),
                    state,
                });
                Err(CircuitBreakerError::Open {
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Apply the outcome of a permitted call
    fn finish(&self, permit: Permit, success: bool) {
        let now = Instant::now();
        let transition = {
            let mut inner = self.inner.lock();
            if !success {
                inner.total_failures += 1;
                inner.last_failure = Some(now);
            }

            match (inner.phase, permit, success) {
                (Phase::Closed { .. }, _, true) => {
                    inner.phase = Phase::Closed { failures: 0 };
                    None
                }
                (Phase::Closed { failures }, _, false) => {
                    let failures = failures.saturating_add(1);
                    if failures >= self.config.failure_threshold() {
                        Self::move_to(&mut inner.phase, Phase::Open { opened_at: now })
                    } else {
                        inner.phase = Phase::Closed { failures };
                        None
                    }
                }
                (Phase::HalfOpen { .. }, Permit::Trial, true) => {
                    Self::move_to(&mut inner.phase, Phase::Closed { failures: 0 })
                }
                (Phase::HalfOpen { .. }, Permit::Trial, false) => {
                    Self::move_to(&mut inner.phase, Phase::Open { opened_at: now })
                }
                // Stale outcomes from calls admitted before the circuit opened
                // do not move an open or probing circuit.
                (Phase::HalfOpen { .. }, Permit::Normal, _) | (Phase::Open { .. }, _, _) => None,
            }
        };
        self.notify(transition);
    }

    fn move_to(phase: &mut Phase, next: Phase) -> Option<Transition> {
        let from = phase.state();
        *phase = next;
        let to = next.state();
        (from != to).then_some((from, to))
    }

    fn notify(&self, transition: Option<Transition>) {
        if let Some((from, to)) = transition {
            self.observer.record(&TelemetryRecord::BreakerTransition {
                breaker: self.name.clone(),
                from,
                to,
            });
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Tracks an admitted call until its outcome is recorded.
///
/// Dropping the guard without completing it (the caller's future was
/// cancelled) releases a half-open trial slot as a failed trial, so the
/// circuit can never be stuck waiting on a probe that will not report back.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: Permit,
    completed: bool,
}

impl CallGuard<'_> {
    fn complete(mut self, success: bool) {
        self.completed = true;
        self.breaker.finish(self.permit, success);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.completed && self.permit == Permit::Trial {
            tracing::debug!(
                circuit = %self.breaker.name,
                "Half-open trial cancelled before completion"
            );
            self.breaker.finish(Permit::Trial, false);
        }
    }
}
