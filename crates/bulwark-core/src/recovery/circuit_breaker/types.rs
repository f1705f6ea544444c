//! Circuit breaker types and configuration

use crate::error::{BulwarkError, BulwarkResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, operations proceed normally
    Closed,
    /// Circuit is open, operations are rejected
    Open,
    /// Circuit is half-open, a single trial operation tests recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Configuration for circuit breaker behavior
///
/// Construction and deserialization both validate, so a breaker can never be
/// built with a zero threshold or a zero reset timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCircuitBreakerConfig")]
pub struct CircuitBreakerConfig {
    failure_threshold: u32,
    #[serde(with = "humantime_serde")]
    reset_timeout: Duration,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawCircuitBreakerConfig {
    failure_threshold: u32,
    #[serde(with = "humantime_serde")]
    reset_timeout: Duration,
}

impl Default for RawCircuitBreakerConfig {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            reset_timeout: defaults.reset_timeout,
        }
    }
}

impl TryFrom<RawCircuitBreakerConfig> for CircuitBreakerConfig {
    type Error = BulwarkError;

    fn try_from(raw: RawCircuitBreakerConfig) -> Result<Self, Self::Error> {
        Self::new(raw.failure_threshold, raw.reset_timeout)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config, rejecting a zero threshold or zero timeout
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> BulwarkResult<Self> {
        let config = Self {
            failure_threshold,
            reset_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a config for aggressive circuit breaking
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(15),
        }
    }

    /// Create a config for lenient circuit breaking
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            reset_timeout: Duration::from_secs(60),
        }
    }

    /// Consecutive failures (while closed) that open the circuit
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time to wait after opening before a trial call is allowed
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn with_failure_threshold(self, threshold: u32) -> BulwarkResult<Self> {
        Self::new(threshold, self.reset_timeout)
    }

    pub fn with_reset_timeout(self, timeout: Duration) -> BulwarkResult<Self> {
        Self::new(self.failure_threshold, timeout)
    }

    /// Check the documented bounds
    pub fn validate(&self) -> BulwarkResult<()> {
        if self.failure_threshold == 0 {
            return Err(BulwarkError::invalid_value(
                "circuit_breaker.failure_threshold",
                "must be greater than zero",
            ));
        }
        if self.reset_timeout.is_zero() {
            return Err(BulwarkError::invalid_value(
                "circuit_breaker.reset_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Error from circuit breaker operations
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, or a half-open trial is already in flight.
    /// The operation was not invoked; callers should try again later.
    #[error("Circuit breaker open for component: {name}")]
    Open { name: String },

    /// The operation did not finish before its deadline; counted as a failure
    #[error("Operation guarded by {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The operation ran and returned an error
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    /// Whether the call was short-circuited without running the operation
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Whether the operation itself ran (and failed or timed out)
    pub fn is_operation_failure(&self) -> bool {
        !self.is_open()
    }

    /// Retry predicate that treats an open circuit as terminal
    pub fn is_retryable(&self) -> bool {
        !self.is_open()
    }

    /// Get the underlying operation error, if any
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Consecutive failures recorded while closed
    pub failure_count: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    /// Calls rejected without running the operation
    pub total_rejections: u64,
    pub opened_at: Option<Instant>,
    pub last_failure: Option<Instant>,
}

impl CircuitBreakerStats {
    /// Calculate failure rate as a percentage
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.total_failures as f64 / self.total_calls as f64) * 100.0
        }
    }
}
