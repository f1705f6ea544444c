//! Outbound call wrapped in cache, retry and circuit breaker

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheLookup, TtlCache};
use crate::config::BulwarkConfig;
use crate::recovery::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerRegistry, RetryError, RetryExecutor,
    RetryPolicy,
};
use crate::telemetry::{SharedObserver, default_observer};

/// Error from a protected call: the retry outcome over breaker outcomes
pub type ProtectedCallError<E> = RetryError<CircuitBreakerError<E>>;

/// A named outbound operation protected by a circuit breaker and retried
/// under a policy, optionally reading through a cache.
///
/// Order of checks for each call: cache lookup, then up to `max_attempts`
/// breaker-guarded invocations. A successful result is written back to the
/// cache when a key was given.
pub struct ProtectedCall<V> {
    name: String,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    cache: Option<(Arc<TtlCache<V>>, Duration)>,
    attempt_timeout: Option<Duration>,
    fail_fast_when_open: bool,
    cancel_token: Option<CancellationToken>,
    observer: SharedObserver,
}

impl<V> ProtectedCall<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            breaker,
            policy,
            cache: None,
            attempt_timeout: None,
            fail_fast_when_open: false,
            cancel_token: None,
            observer: default_observer(),
        }
    }

    /// Build from configuration, sharing the registry's breaker for `name`
    pub fn from_config(
        name: impl Into<String>,
        config: &BulwarkConfig,
        registry: &CircuitBreakerRegistry,
    ) -> Self {
        let name = name.into();
        let breaker = registry.get_with_config(&name, config.circuit_breaker.clone());
        Self::new(name, breaker, config.retry.clone())
    }

    /// Read through `cache`, storing successful results for `ttl`
    pub fn with_cache(mut self, cache: Arc<TtlCache<V>>, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    /// Deadline for each individual attempt; expiry counts against the breaker
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Stop retrying as soon as the breaker rejects a call
    pub fn fail_fast_when_open(mut self, enabled: bool) -> Self {
        self.fail_fast_when_open = enabled;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Observer for retry telemetry
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run `operation` without consulting the cache
    pub async fn call<E, F, Fut>(&self, operation: F) -> Result<V, ProtectedCallError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        self.invoke(&operation).await
    }

    /// Return the cached value for `key` if live; otherwise run `operation`
    /// and cache its success
    pub async fn call_cached<E, F, Fut>(
        &self,
        key: &str,
        operation: F,
    ) -> Result<V, ProtectedCallError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        if let Some((cache, _)) = &self.cache {
            if let CacheLookup::Hit(value) = cache.get(key) {
                return Ok(value);
            }
        }

        let value = self.invoke(&operation).await?;

        if let Some((cache, ttl)) = &self.cache {
            cache.set(key, value.clone(), *ttl);
        }
        Ok(value)
    }

    async fn invoke<E, F, Fut>(&self, operation: &F) -> Result<V, ProtectedCallError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        let fail_fast = self.fail_fast_when_open;
        let mut executor = RetryExecutor::new()
            .with_label(self.name.clone())
            .with_observer(self.observer.clone())
            .with_retry_if(move |e: &CircuitBreakerError<E>| !fail_fast || e.is_retryable());
        if let Some(token) = &self.cancel_token {
            executor = executor.with_cancellation(token.clone());
        }

        let breaker = &*self.breaker;
        let attempt_timeout = self.attempt_timeout;

        executor
            .execute(
                move || async move {
                    match attempt_timeout {
                        Some(limit) => breaker.call_with_timeout(limit, operation).await,
                        None => breaker.call(operation).await,
                    }
                },
                &self.policy,
            )
            .await
    }
}

impl<V> fmt::Debug for ProtectedCall<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedCall")
            .field("name", &self.name)
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .field("cached", &self.cache.is_some())
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}
