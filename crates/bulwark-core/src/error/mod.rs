//! Error types for Bulwark
//!
//! Component-level failures keep the caller's error type intact and live next to
//! their component (`CircuitBreakerError`, `RetryError`). This module holds the
//! crate-wide error used by configuration loading and validation.

mod constructors;
mod conversions;
mod types;

pub use types::{BulwarkError, BulwarkResult};
