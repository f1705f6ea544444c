//! Event bus data types

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A published event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id (UUID v4)
    pub event_id: Uuid,
    /// Publish time
    pub timestamp: DateTime<Utc>,
    /// Event name subscribers register for
    pub name: String,
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event stamped with a fresh id and the current time
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            name: name.into(),
            payload,
        }
    }

    /// Deserialize the payload into a concrete type
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Identifies one subscription; pass it to `unsubscribe`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) id: u64,
    pub(crate) event_name: String,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Deadline for a single handler invocation. An invocation that runs
    /// longer is abandoned and reported as a handler failure.
    #[serde(with = "humantime_serde")]
    pub handler_timeout: Option<Duration>,
}

impl EventBusConfig {
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> crate::error::BulwarkResult<()> {
        if self.handler_timeout.is_some_and(|t| t.is_zero()) {
            return Err(crate::error::BulwarkError::invalid_value(
                "event_bus.handler_timeout",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}
