//! Failure handling for outbound calls
//!
//! This module provides:
//! - Circuit breaker pattern for failing dependencies
//! - Retry executor with exponential backoff
//! - Pure backoff delay computation

pub mod backoff;
pub mod circuit_breaker;
pub mod retry;

pub use backoff::{delay_for_attempt, total_delay};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitBreakerStats, CircuitState,
};
pub use retry::{AlwaysRetry, AttemptError, RetryError, RetryExecutor, RetryPolicy, RetryPredicate};
