//! Bulwark Core Library
//!
//! Resilience and in-process messaging primitives for service-to-service
//! calls: a circuit breaker, a retry executor with exponential backoff, a
//! publish/subscribe event bus, and a TTL cache, plus the configuration and
//! telemetry plumbing around them.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod recovery;
pub mod telemetry;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheLookup, CacheStats, TtlCache};
pub use client::{ProtectedCall, ProtectedCallError};
pub use config::{BulwarkConfig, ConfigLoader, LogFormat, LoggingConfig};
pub use error::{BulwarkError, BulwarkResult};
pub use events::{Event, EventBus, EventBusConfig, EventHandler, HandlerError, SubscriptionHandle};
pub use recovery::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitState, RetryError, RetryExecutor, RetryPolicy,
};
pub use telemetry::{MetricsObserver, Observer, SharedObserver, TelemetryRecord, TracingObserver};
