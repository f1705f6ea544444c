//! In-process publish/subscribe
//!
//! Producers publish named events carrying a JSON payload; every handler
//! subscribed to that name at publish time receives its own copy,
//! asynchronously. Delivery is at-most-once: no persistence, no redelivery,
//! no acknowledgment.

mod bus;
mod handler;
mod types;


pub use bus::EventBus;
pub use handler::{EventHandler, HandlerError};
pub use types::{Event, EventBusConfig, SubscriptionHandle};

use std::sync::Arc;

/// Thread-safe handle to an EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn shared_event_bus(config: EventBusConfig) -> SharedEventBus {
    Arc::new(EventBus::with_config(config))
}
