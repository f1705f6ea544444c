//! Cache types and configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{BulwarkError, BulwarkResult};

/// Stored value with its expiry deadline
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration, now: Instant) -> Self {
        // A TTL too large for the clock is treated as "practically never".
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60));
        Self { value, expires_at }
    }

    /// An entry is live strictly before its deadline
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Result of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<V> {
    Hit(V),
    /// Key absent or expired
    Miss,
}

impl<V> CacheLookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    pub fn into_option(self) -> Option<V> {
        match self {
            Self::Hit(v) => Some(v),
            Self::Miss => None,
        }
    }
}

impl<V> From<CacheLookup<V>> for Option<V> {
    fn from(lookup: CacheLookup<V>) -> Self {
        lookup.into_option()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Misses, including reads of expired entries
    pub misses: u64,
    /// Entries found expired on read or removed by a sweep
    pub expired: u64,
    /// Stored entries, including expired ones not yet removed
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit rate in `[0, 1]`
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL used by `set_default`
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Sweep interval for the background janitor; `None` disables it
    #[serde(with = "humantime_serde")]
    pub janitor_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            janitor_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl CacheConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_janitor_interval(mut self, interval: Option<Duration>) -> Self {
        self.janitor_interval = interval;
        self
    }

    pub fn validate(&self) -> BulwarkResult<()> {
        if self.default_ttl.is_zero() {
            return Err(BulwarkError::invalid_value(
                "cache.default_ttl",
                "must be greater than zero",
            ));
        }
        if self.janitor_interval.is_some_and(|i| i.is_zero()) {
            return Err(BulwarkError::invalid_value(
                "cache.janitor_interval",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}
