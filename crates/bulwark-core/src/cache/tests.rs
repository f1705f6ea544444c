//! Tests for the TTL cache

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::telemetry::{MetricsObserver, MockObserver, NoopObserver, TelemetryRecord};

fn cache<V: Clone + Send + Sync + 'static>() -> TtlCache<V> {
    TtlCache::new().with_observer(Arc::new(NoopObserver))
}

#[tokio::test(start_paused = true)]
async fn test_hit_then_miss_after_expiry() {
    let cache = cache::<String>();
    cache.set("k", "v".to_string(), Duration::from_secs(1));

    assert_eq!(cache.get("k"), CacheLookup::Hit("v".to_string()));

    tokio::time::advance(Duration::from_millis(1100)).await;
    assert_eq!(cache.get("k"), CacheLookup::Miss);
    // Lazy removal on the expired read
    assert!(cache.is_empty());

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_exactly_at_deadline() {
    let cache = cache::<u32>();
    cache.set("k", 1, Duration::from_millis(500));

    tokio::time::advance(Duration::from_millis(499)).await;
    assert!(cache.get("k").is_hit());
    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(cache.get("k").is_miss());
}

#[tokio::test]
async fn test_missing_key_is_miss_not_error() {
    let cache = cache::<u32>();
    assert_eq!(cache.get("nope"), CacheLookup::Miss);
    assert_eq!(cache.get("nope").into_option(), None);
    assert_eq!(cache.stats().expired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_overwrites_value_and_deadline() {
    let cache = cache::<&'static str>();
    cache.set("k", "old", Duration::from_millis(100));
    cache.set("k", "new", Duration::from_secs(10));

    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(cache.get("k"), CacheLookup::Hit("new"));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_delete() {
    let cache = cache::<u32>();
    cache.set("k", 1, Duration::from_secs(60));

    assert!(cache.delete("k"));
    assert!(cache.get("k").is_miss());
    // Absent key is a no-op
    assert!(!cache.delete("k"));
}

#[tokio::test(start_paused = true)]
async fn test_ttl_reports_remaining_time() {
    let cache = cache::<u32>();
    cache.set("k", 1, Duration::from_secs(10));
    tokio::time::advance(Duration::from_secs(4)).await;

    assert_eq!(cache.ttl("k"), Some(Duration::from_secs(6)));
    assert_eq!(cache.ttl("missing"), None);
    // Not counted as a read
    assert_eq!(cache.stats().hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_default_uses_configured_ttl() {
    let cache: TtlCache<u32> =
        TtlCache::with_config(CacheConfig::default().with_default_ttl(Duration::from_secs(2)))
            .with_observer(Arc::new(NoopObserver));
    cache.set_default("k", 5);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get("k").is_hit());
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get("k").is_miss());
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired() {
    let cache = cache::<u32>();
    cache.set("short-1", 1, Duration::from_millis(10));
    cache.set("short-2", 2, Duration::from_millis(10));
    cache.set("long", 3, Duration::from_secs(60));

    tokio::time::advance(Duration::from_millis(20)).await;
    assert_eq!(cache.purge_expired(), 2);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().expired, 2);
}

#[tokio::test(start_paused = true)]
async fn test_janitor_sweeps_until_cancelled() {
    let cache = Arc::new(cache::<u32>());
    let token = CancellationToken::new();
    let janitor = cache.spawn_janitor(Duration::from_secs(1), token.clone());

    cache.set("k", 1, Duration::from_millis(500));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(cache.is_empty());

    token.cancel();
    janitor.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_get_or_insert_with_loads_once() {
    let cache = cache::<u32>();
    let loads = AtomicU32::new(0);

    for _ in 0..3 {
        let value = cache
            .get_or_insert_with("user:1", Duration::from_secs(5), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(6)).await;
    cache
        .get_or_insert_with("user:1", Duration::from_secs(5), || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(43)
        })
        .await
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_get_or_insert_with_error_is_not_cached() {
    let cache = cache::<u32>();
    let result = cache
        .get_or_insert_with("k", Duration::from_secs(5), || async { Err("backend down") })
        .await;
    assert_eq!(result, Err("backend down"));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_concurrent_writers_last_write_wins() {
    let cache = Arc::new(cache::<usize>());
    let mut tasks = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.set("shared", i, Duration::from_secs(60));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(cache.len(), 1);
    assert!(matches!(cache.get("shared"), CacheLookup::Hit(v) if v < 16));
}

#[tokio::test(start_paused = true)]
async fn test_observer_records() {
    let mut observer = MockObserver::new();
    observer
        .expect_record()
        .withf(|r| *r == TelemetryRecord::CacheHit { key: "a".into() })
        .times(1)
        .return_const(());
    observer
        .expect_record()
        .withf(|r| {
            *r == TelemetryRecord::CacheMiss {
                key: "a".into(),
                expired: true,
            }
        })
        .times(1)
        .return_const(());

    let cache: TtlCache<u8> = TtlCache::new().with_observer(Arc::new(observer));
    cache.set("a", 1, Duration::from_millis(10));
    cache.get("a");
    tokio::time::advance(Duration::from_millis(10)).await;
    cache.get("a");
}

#[tokio::test]
async fn test_metrics_hit_rate() {
    let metrics = Arc::new(MetricsObserver::new());
    let cache: TtlCache<u8> = TtlCache::new().with_observer(metrics.clone());
    cache.set("a", 1, Duration::from_secs(60));
    cache.get("a");
    cache.get("a");
    cache.get("b");

    assert!((cache.stats().hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.snapshot().cache_hits, 2);
}

#[test]
fn test_config_validation() {
    assert!(CacheConfig::default().validate().is_ok());
    assert!(
        CacheConfig::default()
            .with_default_ttl(Duration::ZERO)
            .validate()
            .is_err()
    );
    assert!(
        CacheConfig::default()
            .with_janitor_interval(Some(Duration::ZERO))
            .validate()
            .is_err()
    );
}
