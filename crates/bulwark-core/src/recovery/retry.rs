//! Retry executor for transient failures
//!
//! Runs an operation up to `max_attempts` times, sleeping between attempts
//! according to [`delay_for_attempt`](super::backoff::delay_for_attempt).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::backoff::{delay_for_attempt, total_delay};
use crate::error::{BulwarkError, BulwarkResult};
use crate::telemetry::{SharedObserver, TelemetryRecord, default_observer};

/// Retry policy: how many attempts, and how long to wait between them
///
/// Every constructor, builder and deserialization path validates, so a
/// policy in hand always has at least one attempt, a non-zero base delay and
/// a finite multiplier `>= 1`.
///
/// # Example
/// ```
/// use bulwark_core::recovery::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0).unwrap();
/// assert_eq!(policy.max_attempts(), 3);
/// assert!(policy.clone().with_backoff_multiplier(-2.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRetryPolicy")]
pub struct RetryPolicy {
    max_attempts: u32,
    #[serde(with = "humantime_serde")]
    base_delay: Duration,
    backoff_multiplier: f64,
}

/// Unchecked wire form of [`RetryPolicy`]
#[derive(Deserialize)]
#[serde(default)]
struct RawRetryPolicy {
    max_attempts: u32,
    #[serde(with = "humantime_serde")]
    base_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RawRetryPolicy {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay: defaults.base_delay,
            backoff_multiplier: defaults.backoff_multiplier,
        }
    }
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = BulwarkError;

    fn try_from(raw: RawRetryPolicy) -> Result<Self, Self::Error> {
        Self::new(raw.max_attempts, raw.base_delay, raw.backoff_multiplier)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy, rejecting out-of-range values
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        backoff_multiplier: f64,
    ) -> BulwarkResult<Self> {
        let policy = Self {
            max_attempts,
            base_delay,
            backoff_multiplier,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Same delay between every attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> BulwarkResult<Self> {
        Self::new(max_attempts, delay, 1.0)
    }

    /// Total attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failed attempt
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Growth factor applied to each later delay
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn with_max_attempts(self, max: u32) -> BulwarkResult<Self> {
        Self::new(max, self.base_delay, self.backoff_multiplier)
    }

    pub fn with_base_delay(self, delay: Duration) -> BulwarkResult<Self> {
        Self::new(self.max_attempts, delay, self.backoff_multiplier)
    }

    pub fn with_backoff_multiplier(self, multiplier: f64) -> BulwarkResult<Self> {
        Self::new(self.max_attempts, self.base_delay, multiplier)
    }

    pub fn validate(&self) -> BulwarkResult<()> {
        if self.max_attempts == 0 {
            return Err(BulwarkError::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.base_delay.is_zero() {
            return Err(BulwarkError::invalid_value(
                "retry.base_delay",
                "must be greater than zero",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(BulwarkError::invalid_value(
                "retry.backoff_multiplier",
                format!("must be a finite number >= 1, got {}", self.backoff_multiplier),
            ));
        }
        Ok(())
    }
}

/// Error returned when a retried operation does not succeed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The retry predicate rejected an error; no further attempts were made
    #[error("Retry aborted on attempt {attempt}: {error}")]
    Aborted { attempt: u32, error: E },

    /// The cancellation token fired
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of attempts that actually ran
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last error the operation returned, if any attempt ran to completion
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::Aborted { error, .. } => Some(error),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::Aborted { error, .. } => Some(error),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Outcome of a single attempt run under a deadline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError<E> {
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(E),
}

/// Decides whether an error is worth another attempt
pub trait RetryPredicate<E> {
    fn should_retry(&self, error: &E) -> bool;
}

/// Default predicate: every error is retried
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

impl<E, F> RetryPredicate<E> for F
where
    F: Fn(&E) -> bool,
{
    fn should_retry(&self, error: &E) -> bool {
        self(error)
    }
}

/// Executes operations under a [`RetryPolicy`]
///
/// The policy is passed per call; the executor only carries how failures are
/// reported, which errors are retried, and an optional cancellation token.
#[derive(Clone)]
pub struct RetryExecutor<P = AlwaysRetry> {
    label: String,
    observer: SharedObserver,
    retry_if: P,
    cancel_token: Option<CancellationToken>,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self {
            label: "operation".to_string(),
            observer: default_observer(),
            retry_if: AlwaysRetry,
            cancel_token: None,
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RetryExecutor<P> {
    /// Name used in telemetry records
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Abandon the in-flight attempt or backoff sleep once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Only retry errors for which `predicate` returns true
    pub fn with_retry_if<Q>(self, predicate: Q) -> RetryExecutor<Q> {
        RetryExecutor {
            label: self.label,
            observer: self.observer,
            retry_if: predicate,
            cancel_token: self.cancel_token,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Execute an operation with retries
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: F,
        policy: &RetryPolicy,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: RetryPredicate<E>,
    {
        self.run(operation, policy, |e: &E| self.retry_if.should_retry(e))
            .await
    }

    /// Execute an operation with retries, giving each attempt at most
    /// `attempt_timeout`. A timed-out attempt counts as failed and is always
    /// eligible for retry.
    pub async fn execute_with_timeout<T, E, F, Fut>(
        &self,
        mut operation: F,
        policy: &RetryPolicy,
        attempt_timeout: Duration,
    ) -> Result<T, RetryError<AttemptError<E>>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: RetryPredicate<E>,
    {
        let timed = || {
            let attempt = operation();
            async move {
                match tokio::time::timeout(attempt_timeout, attempt).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(AttemptError::Failed(e)),
                    Err(_) => Err(AttemptError::TimedOut(attempt_timeout)),
                }
            }
        };

        self.run(timed, policy, |e: &AttemptError<E>| match e {
            AttemptError::TimedOut(_) => true,
            AttemptError::Failed(inner) => self.retry_if.should_retry(inner),
        })
        .await
    }

    async fn run<T, E, F, Fut, R>(
        &self,
        mut operation: F,
        policy: &RetryPolicy,
        should_retry: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = policy.max_attempts();
        let mut attempt = 0;

        loop {
            if self.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let outcome = match &self.cancel_token {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    outcome = operation() => outcome,
                },
                None => operation().await,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = %self.label,
                            attempt = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !should_retry(&error) {
                self.observer.record(&TelemetryRecord::RetryAttemptFailed {
                    operation: self.label.clone(),
                    attempt,
                    max_attempts,
                    next_delay: None,
                    error: error.to_string(),
                });
                return Err(RetryError::Aborted { attempt, error });
            }

            if attempt >= max_attempts {
                tracing::debug!(
                    operation = %self.label,
                    attempts = attempt,
                    waited = ?total_delay(policy),
                    "Retry budget spent"
                );
                self.observer.record(&TelemetryRecord::RetryAttemptFailed {
                    operation: self.label.clone(),
                    attempt,
                    max_attempts,
                    next_delay: None,
                    error: error.to_string(),
                });
                self.observer.record(&TelemetryRecord::RetryExhausted {
                    operation: self.label.clone(),
                    attempts: attempt,
                });
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = delay_for_attempt(policy, attempt);
            self.observer.record(&TelemetryRecord::RetryAttemptFailed {
                operation: self.label.clone(),
                attempt,
                max_attempts,
                next_delay: Some(delay),
                error: error.to_string(),
            });

            match &self.cancel_token {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    _ = sleep(delay) => {}
                },
                None => sleep(delay).await,
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

impl<P> fmt::Debug for RetryExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("label", &self.label)
            .field("cancellable", &self.cancel_token.is_some())
            .finish()
    }
}
