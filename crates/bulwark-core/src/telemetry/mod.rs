//! Telemetry boundary for Bulwark components
//!
//! Components never format or ship telemetry themselves. They emit
//! [`TelemetryRecord`]s to an [`Observer`], which is owned by the surrounding
//! service layer. Two observers ship with the crate:
//!
//! - [`TracingObserver`]: turns records into structured `tracing` events (default)
//! - [`MetricsObserver`]: aggregates records into atomic counters

mod metrics;
mod observer;
mod record;

pub use metrics::{Counter, MetricsObserver, MetricsSnapshot};
pub use observer::{FanoutObserver, NoopObserver, Observer, SharedObserver, TracingObserver};
pub use record::TelemetryRecord;

#[cfg(test)]
pub use observer::MockObserver;

/// Observer used when a component is built without an explicit one
pub fn default_observer() -> SharedObserver {
    std::sync::Arc::new(TracingObserver)
}
