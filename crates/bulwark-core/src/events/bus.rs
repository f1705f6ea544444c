//! Publish/subscribe bus with one delivery worker per subscription

use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::handler::EventHandler;
use super::types::{Event, EventBusConfig, SubscriptionHandle};
use crate::error::{BulwarkError, BulwarkResult};
use crate::telemetry::{SharedObserver, TelemetryRecord, default_observer};

struct Subscription {
    id: u64,
    sender: mpsc::UnboundedSender<Event>,
    worker: JoinHandle<()>,
}

/// Event bus for named events
///
/// Every subscription owns an unbounded queue drained by its own task, so a
/// subscriber sees events in publish order and a slow handler only delays
/// itself. Must be used from within a tokio runtime.
///
/// # Example
///
/// ```rust
/// use bulwark_core::events::{Event, EventBus};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() {
///     let bus = EventBus::new();
///     bus.subscribe("user.created", |event: Event| async move {
///         println!("new user: {}", event.payload);
///         Ok::<_, std::convert::Infallible>(())
///     })
///     .unwrap();
///
///     bus.publish("user.created", json!({ "id": 7 }));
///     bus.shutdown().await;
/// }
/// ```
pub struct EventBus {
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    config: EventBusConfig,
    observer: SharedObserver,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            config,
            observer: default_observer(),
        }
    }

    /// Report handler failures to a custom observer
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Register `handler` for events named `event_name`.
    ///
    /// Only events published after this call are delivered. Fails once the
    /// bus has been shut down.
    pub fn subscribe<H>(
        &self,
        event_name: impl Into<String>,
        handler: H,
    ) -> BulwarkResult<SubscriptionHandle>
    where
        H: EventHandler + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(BulwarkError::shutdown("event bus"));
        }

        let event_name = event_name.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let worker = Worker {
            subscription_id: id,
            handler: Arc::new(handler),
            receiver,
            observer: self.observer.clone(),
            config: self.config.clone(),
        };
        let worker = tokio::spawn(worker.run());

        self.subscriptions
            .write()
            .entry(event_name.clone())
            .or_default()
            .push(Subscription { id, sender, worker });

        tracing::debug!(event = %event_name, subscription = id, "Subscribed");
        Ok(SubscriptionHandle { id, event_name })
    }

    /// Remove a subscription. Events already queued for it are still
    /// delivered; nothing published afterwards is. Returns false if the
    /// handle was not registered.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(list) = subscriptions.get_mut(&handle.event_name) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscriptions.remove(&handle.event_name);
        }
        if removed {
            tracing::debug!(event = %handle.event_name, subscription = handle.id, "Unsubscribed");
        }
        removed
    }

    /// Build an event and enqueue it for every current subscriber of
    /// `event_name`. Does not wait for handlers.
    pub fn publish(&self, event_name: impl Into<String>, payload: serde_json::Value) -> Event {
        let event = Event::new(event_name, payload);
        self.publish_event(&event);
        event
    }

    /// Enqueue a prebuilt event; returns how many subscribers it was queued for
    pub fn publish_event(&self, event: &Event) -> usize {
        let subscriptions = self.subscriptions.read();
        let Some(list) = subscriptions.get(&event.name) else {
            tracing::trace!(event = %event.name, "No subscribers");
            return 0;
        };

        list.iter()
            .filter(|s| s.sender.send(event.clone()).is_ok())
            .count()
    }

    /// Number of subscriptions for an event name
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscriptions
            .read()
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Event names with at least one subscriber, sorted
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscriptions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drop every subscription and wait for the workers to deliver what is
    /// already queued. Later `subscribe` calls fail.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<Subscription> = {
            let mut subscriptions = self.subscriptions.write();
            subscriptions.drain().flat_map(|(_, list)| list).collect()
        };

        let count = drained.len();
        let workers: Vec<JoinHandle<()>> = drained
            .into_iter()
            .map(|Subscription { sender, worker, .. }| {
                drop(sender);
                worker
            })
            .collect();

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Event worker ended abnormally");
            }
        }
        tracing::debug!(subscriptions = count, "Event bus shut down");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_names", &self.event_names())
            .field("closed", &self.is_closed())
            .field("config", &self.config)
            .finish()
    }
}

struct Worker {
    subscription_id: u64,
    handler: Arc<dyn EventHandler>,
    receiver: mpsc::UnboundedReceiver<Event>,
    observer: SharedObserver,
    config: EventBusConfig,
}

impl Worker {
    async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if let Err(error) = self.deliver(event.clone()).await {
                self.observer.record(&TelemetryRecord::HandlerFailed {
                    event_name: event.name,
                    event_id: event.event_id,
                    subscription_id: self.subscription_id,
                    error,
                });
            }
        }
    }

    /// Run the handler once, turning errors, panics and timeouts into a message
    async fn deliver(&self, event: Event) -> Result<(), String> {
        let handler = self.handler.clone();
        let invocation = AssertUnwindSafe(async move { handler.handle(event).await }).catch_unwind();

        let outcome = match self.config.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(format!("handler timed out after {limit:?}")),
            },
            None => invocation.await,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
