//! Backoff delay computation
//!
//! Delays grow geometrically: `base_delay * backoff_multiplier^(n-1)` after
//! failed attempt `n`. There is no jitter and no cap.

use std::time::Duration;

use super::retry::RetryPolicy;

/// Delay to wait after failed attempt `attempt` (1-indexed).
///
/// Attempt 0 is treated as attempt 1. Results too large to represent
/// saturate at [`Duration::MAX`].
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let factor = policy.backoff_multiplier().powi(exponent);
    let secs = policy.base_delay().as_secs_f64() * factor;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Sum of every wait a fully failing run of `policy` would sleep through
pub fn total_delay(policy: &RetryPolicy) -> Duration {
    (1..policy.max_attempts())
        .map(|n| delay_for_attempt(policy, n))
        .fold(Duration::ZERO, Duration::saturating_add)
}
