//! `bulwark demo`
//!
//! Sends a run of requests through a [`ProtectedCall`] to a downstream that
//! fails for its first `outage_calls` invocations and then recovers. Results
//! are published on the event bus; one subscriber always fails so its
//! failures show up as contained handler errors.

use anyhow::Context;
use bulwark_core::cache::TtlCache;
use bulwark_core::client::ProtectedCall;
use bulwark_core::config::BulwarkConfig;
use bulwark_core::events::{Event, EventBus, HandlerError};
use bulwark_core::recovery::{CircuitBreakerRegistry, CircuitState};
use bulwark_core::telemetry::{
    FanoutObserver, MetricsObserver, MetricsSnapshot, SharedObserver, TracingObserver,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

use crate::args::DemoArgs;

const OPERATION: &str = "inventory";
const FETCHED: &str = "inventory.fetched";
const FAILED: &str = "inventory.failed";

#[derive(Debug, thiserror::Error)]
enum DownstreamError {
    #[error("inventory service unavailable (call {call})")]
    Unavailable { call: u32 },
}

/// Stand-in for a remote inventory service
#[derive(Debug)]
struct FlakyDownstream {
    calls: AtomicU32,
    outage_calls: u32,
}

impl FlakyDownstream {
    fn new(outage_calls: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            outage_calls,
        }
    }

    async fn fetch(&self, key: &str) -> Result<Value, DownstreamError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.outage_calls {
            return Err(DownstreamError::Unavailable { call });
        }
        Ok(json!({ "key": key, "in_stock": 40 + call, "served_by_call": call }))
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Run the scripted scenario and return the collected metrics
pub async fn run(config: &BulwarkConfig, args: &DemoArgs) -> anyhow::Result<MetricsSnapshot> {
    let metrics = Arc::new(MetricsObserver::new());
    let observer: SharedObserver = Arc::new(
        FanoutObserver::new()
            .with(Arc::new(TracingObserver))
            .with(metrics.clone()),
    );

    let registry = CircuitBreakerRegistry::with_config(config.circuit_breaker.clone())
        .with_observer(observer.clone());
    let cache = Arc::new(TtlCache::with_config(config.cache.clone()).with_observer(observer.clone()));
    let bus = EventBus::with_config(config.event_bus.clone()).with_observer(observer.clone());

    let shutdown = CancellationToken::new();
    let janitor = config
        .cache
        .janitor_interval
        .map(|interval| cache.spawn_janitor(interval, shutdown.clone()));

    subscribe_handlers(&bus)?;

    let call = ProtectedCall::from_config(OPERATION, config, &registry)
        .with_cache(cache.clone(), config.cache.default_ttl)
        .with_cancellation(shutdown.clone())
        .fail_fast_when_open(true)
        .with_observer(observer.clone());
    let downstream = FlakyDownstream::new(args.outage_calls);
    let keys = args.keys.max(1);

    for request in 0..args.requests {
        let key = format!("sku:{}", request % keys);
        match call.call_cached(&key, || downstream.fetch(&key)).await {
            Ok(value) => {
                bus.publish(FETCHED, json!({ "request": request, "key": key, "value": value }));
            }
            Err(e) => {
                tracing::warn!(request, key = %key, attempts = e.attempts(), error = %e, "Request failed");
                bus.publish(FAILED, json!({ "request": request, "key": key, "error": e.to_string() }));
            }
        }

        if call.breaker().state() == CircuitState::Open {
            let wait = call.breaker().config().reset_timeout();
            tracing::info!(?wait, "Circuit open, waiting for reset timeout");
            tokio::time::sleep(wait).await;
        }
    }

    bus.shutdown().await;
    shutdown.cancel();
    if let Some(janitor) = janitor {
        janitor.await.context("cache janitor task failed")?;
    }

    tracing::info!(
        downstream_calls = downstream.calls(),
        cached_entries = cache.len(),
        "Demo finished"
    );
    Ok(metrics.snapshot())
}

fn subscribe_handlers(bus: &EventBus) -> anyhow::Result<()> {
    bus.subscribe(FETCHED, |event: Event| async move {
        tracing::info!(event_id = %event.event_id, payload = %event.payload, "Inventory fetched");
        Ok::<_, HandlerError>(())
    })?;

    // Paging integration that is itself down; its errors stay contained.
    bus.subscribe(FAILED, |_event: Event| async {
        Err::<(), HandlerError>("pager endpoint unreachable".into())
    })?;

    bus.subscribe(FAILED, |event: Event| async move {
        tracing::info!(event_id = %event.event_id, payload = %event.payload, "Failure recorded");
        Ok::<_, HandlerError>(())
    })?;

    Ok(())
}
