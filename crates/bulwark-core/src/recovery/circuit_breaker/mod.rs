//! Circuit breaker pattern for fault tolerance
//!
//! Prevents cascading failures by short-circuiting calls to an operation that
//! keeps failing, and probes for recovery with a single trial call.
//!
//! ```text
//! Closed ──(failure_threshold consecutive failures)──▶ Open
//! Open ──(reset_timeout elapsed, next call)──▶ HalfOpen (one trial in flight)
//! HalfOpen ──(trial succeeds)──▶ Closed
//! HalfOpen ──(trial fails)──▶ Open
//! ```

mod breaker;
mod registry;
mod types;


pub use breaker::CircuitBreaker;
pub use registry::CircuitBreakerRegistry;
pub use types::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState};
