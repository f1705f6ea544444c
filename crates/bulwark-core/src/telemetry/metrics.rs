//! Counter-based metrics observer

use super::observer::Observer;
use super::record::TelemetryRecord;
use crate::recovery::circuit_breaker::CircuitState;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter metric (monotonically increasing)
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicU64::new(0),
        }
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current count
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Metric name
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub breaker_opened: u64,
    pub breaker_half_opened: u64,
    pub breaker_closed: u64,
    pub breaker_rejections: u64,
    pub retry_failed_attempts: u64,
    pub retry_exhausted: u64,
    pub handler_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Latest known state per breaker name
    pub breaker_states: BTreeMap<String, CircuitState>,
}

impl MetricsSnapshot {
    /// Cache hit ratio in `[0, 1]`, zero when there were no lookups
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Observer that aggregates records into counters
#[derive(Debug)]
pub struct MetricsObserver {
    breaker_opened: Counter,
    breaker_half_opened: Counter,
    breaker_closed: Counter,
    breaker_rejections: Counter,
    retry_failed_attempts: Counter,
    retry_exhausted: Counter,
    handler_failures: Counter,
    cache_hits: Counter,
    cache_misses: Counter,
    breaker_states: RwLock<BTreeMap<String, CircuitState>>,
}

impl MetricsObserver {
    /// Create an observer with all counters at zero
    pub fn new() -> Self {
        Self {
            breaker_opened: Counter::new("bulwark_breaker_opened_total"),
            breaker_half_opened: Counter::new("bulwark_breaker_half_opened_total"),
            breaker_closed: Counter::new("bulwark_breaker_closed_total"),
            breaker_rejections: Counter::new("bulwark_breaker_rejections_total"),
            retry_failed_attempts: Counter::new("bulwark_retry_failed_attempts_total"),
            retry_exhausted: Counter::new("bulwark_retry_exhausted_total"),
            handler_failures: Counter::new("bulwark_handler_failures_total"),
            cache_hits: Counter::new("bulwark_cache_hits_total"),
            cache_misses: Counter::new("bulwark_cache_misses_total"),
            breaker_states: RwLock::new(BTreeMap::new()),
        }
    }

    /// Take a snapshot of the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            breaker_opened: self.breaker_opened.get(),
            breaker_half_opened: self.breaker_half_opened.get(),
            breaker_closed: self.breaker_closed.get(),
            breaker_rejections: self.breaker_rejections.get(),
            retry_failed_attempts: self.retry_failed_attempts.get(),
            retry_exhausted: self.retry_exhausted.get(),
            handler_failures: self.handler_failures.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            breaker_states: self.breaker_states.read().clone(),
        }
    }

    /// All counters, for exporters that want name/value pairs
    pub fn counters(&self) -> Vec<(&'static str, u64)> {
        self.all().iter().map(|c| (c.name(), c.get())).collect()
    }

    /// Reset every counter to zero and forget breaker states
    pub fn reset(&self) {
        for counter in self.all() {
            counter.reset();
        }
        self.breaker_states.write().clear();
    }

    fn all(&self) -> [&Counter; 9] {
        [
            &self.breaker_opened,
            &self.breaker_half_opened,
            &self.breaker_closed,
            &self.breaker_rejections,
            &self.retry_failed_attempts,
            &self.retry_exhausted,
            &self.handler_failures,
            &self.cache_hits,
            &self.cache_misses,
        ]
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for MetricsObserver {
    fn record(&self, record: &TelemetryRecord) {
        match record {
            TelemetryRecord::BreakerTransition { breaker, to, .. } => {
                match to {
                    CircuitState::Open => self.breaker_opened.inc(),
                    CircuitState::HalfOpen => self.breaker_half_opened.inc(),
                    CircuitState::Closed => self.breaker_closed.inc(),
                }
                self.breaker_states.write().insert(breaker.clone(), *to);
            }
            TelemetryRecord::BreakerRejected { .. } => self.breaker_rejections.inc(),
            TelemetryRecord::RetryAttemptFailed { .. } => self.retry_failed_attempts.inc(),
            TelemetryRecord::RetryExhausted { .. } => self.retry_exhausted.inc(),
            TelemetryRecord::HandlerFailed { .. } => self.handler_failures.inc(),
            TelemetryRecord::CacheHit { .. } => self.cache_hits.inc(),
            TelemetryRecord::CacheMiss { .. } => self.cache_misses.inc(),
        }
    }
}
