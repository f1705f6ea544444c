//! Observer trait and the built-in observers

use super::record::TelemetryRecord;
use crate::recovery::circuit_breaker::CircuitState;
use std::sync::Arc;

/// Receiver of telemetry records
///
/// Implementations must be cheap and non-blocking: records are emitted inline
/// on the hot path of every protected call.
#[cfg_attr(test, mockall::automock)]
pub trait Observer: Send + Sync {
    /// Handle a single record
    fn record(&self, record: &TelemetryRecord);
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn Observer>;

/// Observer that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record(&self, _record: &TelemetryRecord) {}
}

/// Observer that emits each record as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, record: &TelemetryRecord) {
        match record {
            TelemetryRecord::BreakerTransition { breaker, from, to } => match to {
                CircuitState::Open => tracing::warn!(
                    circuit = %breaker,
                    from = ?from,
                    "Circuit breaker opened"
                ),
                CircuitState::HalfOpen => tracing::info!(
                    circuit = %breaker,
                    "Circuit breaker transitioning to half-open"
                ),
                CircuitState::Closed => tracing::info!(
                    circuit = %breaker,
                    from = ?from,
                    "Circuit breaker closed"
                ),
            },
            TelemetryRecord::BreakerRejected { breaker, state } => {
                tracing::debug!(circuit = %breaker, state = ?state, "Call rejected by circuit breaker")
            }
            TelemetryRecord::RetryAttemptFailed {
                operation,
                attempt,
                max_attempts,
                next_delay,
                error,
            } => tracing::warn!(
                operation = %operation,
                attempt = attempt,
                max_attempts = max_attempts,
                next_delay_ms = next_delay.map(|d| d.as_millis() as u64),
                error = %error,
                "Attempt failed"
            ),
            TelemetryRecord::RetryExhausted {
                operation,
                attempts,
            } => tracing::error!(
                operation = %operation,
                attempts = attempts,
                "All retry attempts exhausted"
            ),
            TelemetryRecord::HandlerFailed {
                event_name,
                event_id,
                subscription_id,
                error,
            } => tracing::error!(
                event = %event_name,
                event_id = %event_id,
                subscription = subscription_id,
                error = %error,
                "Event handler failed"
            ),
            TelemetryRecord::CacheHit { key } => tracing::trace!(key = %key, "Cache hit"),
            TelemetryRecord::CacheMiss { key, expired } => {
                tracing::trace!(key = %key, expired = expired, "Cache miss")
            }
        }
    }
}

/// Observer that forwards every record to several observers in order
#[derive(Clone, Default)]
pub struct FanoutObserver {
    observers: Vec<SharedObserver>,
}

impl FanoutObserver {
    /// Create an empty fan-out observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer to the fan-out list
    pub fn with(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of downstream observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no downstream observers are registered
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Observer for FanoutObserver {
    fn record(&self, record: &TelemetryRecord) {
        for observer in &self.observers {
            observer.record(record);
        }
    }
}
