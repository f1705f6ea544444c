//! Event handler trait

use async_trait::async_trait;
use std::future::Future;

use super::types::Event;

/// Error type handlers report back to the bus
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer of published events
///
/// Errors and panics raised by a handler are caught by the bus and reported
/// to its observer; they never reach the publisher or other handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), HandlerError>;
}

/// Any `Fn(Event) -> impl Future<Output = Result<(), E>>` is a handler
#[async_trait]
impl<F, Fut, E> EventHandler for F
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<HandlerError> + 'static,
{
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        (self)(event).await.map_err(Into::into)
    }
}
