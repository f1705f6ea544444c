//! Structured records emitted by Bulwark components

use crate::recovery::circuit_breaker::CircuitState;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// A single observable occurrence inside the core
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryRecord {
    /// A circuit breaker changed state
    BreakerTransition {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
    },

    /// A call was short-circuited without invoking the operation
    BreakerRejected { breaker: String, state: CircuitState },

    /// A retry attempt failed
    RetryAttemptFailed {
        operation: String,
        attempt: u32,
        max_attempts: u32,
        /// Delay before the next attempt, `None` when this was the last one
        #[serde(with = "humantime_serde")]
        next_delay: Option<Duration>,
        error: String,
    },

    /// Every attempt of a retried operation failed
    RetryExhausted { operation: String, attempts: u32 },

    /// An event handler returned an error or panicked
    HandlerFailed {
        event_name: String,
        event_id: Uuid,
        subscription_id: u64,
        error: String,
    },

    /// A cache read found a live entry
    CacheHit { key: String },

    /// A cache read found nothing, or only an expired entry
    CacheMiss { key: String, expired: bool },
}

impl TelemetryRecord {
    /// Short, stable name of the record kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BreakerTransition { .. } => "breaker_transition",
            Self::BreakerRejected { .. } => "breaker_rejected",
            Self::RetryAttemptFailed { .. } => "retry_attempt_failed",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::HandlerFailed { .. } => "handler_failed",
            Self::CacheHit { .. } => "cache_hit",
            Self::CacheMiss { .. } => "cache_miss",
        }
    }
}
