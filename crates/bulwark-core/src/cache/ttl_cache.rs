//! In-memory key/value cache with per-entry expiry

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::{CacheConfig, CacheEntry, CacheLookup, CacheStats};
use crate::telemetry::{SharedObserver, TelemetryRecord, default_observer};

/// TTL cache
///
/// Entries are never evicted for space; they leave the map when read after
/// expiry, when deleted, or when a sweep finds them expired. Concurrent writes
/// to one key are serialised by the map's shard lock and the last write wins.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    observer: SharedObserver,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            observer: default_observer(),
        }
    }

    /// Report hits and misses to a custom observer
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read a live value. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> CacheLookup<V> {
        let now = Instant::now();

        // The shard guard must be released before `remove_if` touches the
        // same shard.
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                drop(entry);
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.observer.record(&TelemetryRecord::CacheHit {
                    key: key.to_string(),
                });
                return CacheLookup::Hit(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired
            && self
                .entries
                .remove_if(key, |_, entry| entry.is_expired_at(now))
                .is_some()
        {
            self.expired.fetch_add(1, Ordering::Relaxed);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.observer.record(&TelemetryRecord::CacheMiss {
            key: key.to_string(),
            expired,
        });
        CacheLookup::Miss
    }

    /// Store `value` under `key` until `ttl` from now, replacing any
    /// previous entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, ttl, Instant::now());
        self.entries.insert(key.into(), entry);
    }

    /// Store with the configured default TTL
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.config.default_ttl);
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Time left before `key` expires, if it is live. Does not count as a read.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Read through the cache: on a miss, run `loader` and store its value.
    ///
    /// Concurrent misses on the same key each run their own loader.
    pub async fn get_or_insert_with<E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let CacheLookup::Hit(value) = self.get(key) {
            return Ok(value);
        }

        let value = loader().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Physically remove every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            tracing::debug!(removed = removed, "Purged expired cache entries");
        }
        removed
    }

    /// Stored entries, including expired ones not yet removed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Sweep expired entries every `interval` until `token` is cancelled
    pub fn spawn_janitor(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Cache janitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.purge_expired();
                    }
                }
            }
        })
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}
