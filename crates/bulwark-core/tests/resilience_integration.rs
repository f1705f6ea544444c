//! Integration tests for the Bulwark core components
//!
//! Exercises the public API the way a calling service would: breaker and
//! retry around a flaky downstream, the cache in front of it, and events
//! fanned out to independent subscribers.

use bulwark_core::cache::{CacheLookup, TtlCache};
use bulwark_core::client::ProtectedCall;
use bulwark_core::events::{Event, EventBus, HandlerError};
use bulwark_core::recovery::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, RetryError,
    RetryExecutor, RetryPolicy,
};
use bulwark_core::telemetry::{FanoutObserver, MetricsObserver, NoopObserver, SharedObserver};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{Barrier, mpsc};
use tokio::time::Instant;

fn quiet() -> SharedObserver {
    Arc::new(NoopObserver)
}

#[tokio::test(start_paused = true)]
async fn breaker_rejects_after_threshold_and_recovers_with_single_trial() {
    let breaker = Arc::new(
        CircuitBreaker::with_config(
            "payments",
            CircuitBreakerConfig::new(3, Duration::from_secs(5)).unwrap(),
        )
        .with_observer(quiet()),
    );

    for _ in 0..3 {
        let _ = breaker.call(|| async { Err::<(), _>("503") }).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let invoked = AtomicU32::new(0);
    let rejected = breaker
        .call(|| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await;
    assert!(matches!(rejected, Err(CircuitBreakerError::Open { .. })));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    tokio::time::advance(Duration::from_secs(5)).await;

    // Eight callers race for the half-open slot; exactly one may run.
    let barrier = Arc::new(Barrier::new(8));
    let ran = Arc::new(AtomicU32::new(0));
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let breaker = breaker.clone();
        let barrier = barrier.clone();
        let ran = ran.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            breaker
                .call(|| async {
                    ran.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, String>(())
                })
                .await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => successes += 1,
            Err(e) if e.is_open() => rejections += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!((successes, rejections), (1, 7));
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.stats().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_reopens_with_fresh_timestamp() {
    let breaker = CircuitBreaker::with_config(
        "search",
        CircuitBreakerConfig::new(1, Duration::from_secs(1)).unwrap(),
    )
    .with_observer(quiet());

    let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
    let first = breaker.stats().opened_at.unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    let _ = breaker.call(|| async { Err::<(), _>("still down") }).await;

    let stats = breaker.stats();
    assert_eq!(stats.state, CircuitState::Open);
    assert_eq!(stats.opened_at.unwrap() - first, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn retry_waits_100ms_then_200ms_and_reports_exhaustion() {
    let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0).unwrap();
    let started = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = RetryExecutor::new()
        .with_observer(quiet())
        .execute(
            || {
                let _ = tx.send(started.elapsed());
                async { Err::<(), _>("timeout") }
            },
            &policy,
        )
        .await;

    match result {
        Err(RetryError::Exhausted {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, "timeout");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }

    drop(tx);
    let mut offsets = Vec::new();
    while let Some(offset) = rx.recv().await {
        offsets.push(offset);
    }
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(100),
            Duration::from_millis(300)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cache_entry_expires_after_ttl() {
    let cache: TtlCache<String> = TtlCache::new().with_observer(quiet());
    cache.set("k", "v".into(), Duration::from_secs(1));
    assert_eq!(cache.get("k"), CacheLookup::Hit("v".into()));

    tokio::time::advance(Duration::from_millis(1100)).await;
    assert_eq!(cache.get("k"), CacheLookup::Miss);
}

#[tokio::test]
async fn failing_subscriber_is_isolated_and_order_is_kept() {
    let metrics = Arc::new(MetricsObserver::new());
    let bus = EventBus::new().with_observer(metrics.clone());

    bus.subscribe("order.updated", |_e: Event| async {
        Err::<(), HandlerError>("projection store unavailable".into())
    })
    .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.subscribe("order.updated", move |e: Event| {
        let tx = tx.clone();
        async move {
            tx.send(e.payload["seq"].as_u64().unwrap_or_default())
                .map_err(|e| HandlerError::from(e.to_string()))
        }
    })
    .unwrap();

    for seq in 0..50u64 {
        bus.publish("order.updated", json!({ "seq": seq }));
    }
    bus.shutdown().await;

    let mut received = Vec::new();
    while let Ok(seq) = rx.try_recv() {
        received.push(seq);
    }
    assert_eq!(received, (0..50).collect::<Vec<_>>());
    assert_eq!(metrics.snapshot().handler_failures, 50);
}

#[tokio::test]
async fn unsubscribed_handler_receives_nothing_later() {
    let bus = EventBus::new().with_observer(quiet());
    let count = Arc::new(AtomicU32::new(0));

    let handle = {
        let count = count.clone();
        bus.subscribe("ping", move |_e: Event| {
            count.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, HandlerError>(()) }
        })
        .unwrap()
    };

    bus.publish("ping", json!(1));
    assert!(bus.unsubscribe(&handle));
    bus.shutdown().await;
    let delivered_before = count.load(Ordering::SeqCst);
    assert!(delivered_before <= 1);

    assert_eq!(bus.publish_event(&Event::new("ping", json!(2))), 0);
    tokio::task::yield_now().await;
    assert_eq!(count.load(Ordering::SeqCst), delivered_before);
}

#[tokio::test(start_paused = true)]
async fn protected_call_composes_cache_retry_and_breaker() {
    let metrics = Arc::new(MetricsObserver::new());
    let observer: SharedObserver =
        Arc::new(FanoutObserver::new().with(metrics.clone()).with(quiet()));

    let breaker = Arc::new(
        CircuitBreaker::with_config(
            "profile-service",
            CircuitBreakerConfig::default().with_failure_threshold(5).unwrap(),
        )
        .with_observer(observer.clone()),
    );
    let cache = Arc::new(TtlCache::new().with_observer(observer.clone()));
    let call = ProtectedCall::new(
        "profile-service",
        breaker.clone(),
        RetryPolicy::new(3, Duration::from_millis(50), 2.0).unwrap(),
    )
    .with_cache(cache.clone(), Duration::from_secs(60))
    .with_observer(observer.clone());

    let attempts = AtomicU32::new(0);
    let fetch = || async {
        let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 1 {
            Err("connection reset".to_string())
        } else {
            Ok(json!({ "name": "Ada" }))
        }
    };

    let first = call.call_cached("user:42", fetch).await.unwrap();
    let second = call.call_cached("user:42", fetch).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.state(), CircuitState::Closed);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.retry_failed_attempts, 1);
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 1);
}
