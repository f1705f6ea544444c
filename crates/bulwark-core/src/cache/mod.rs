//! Time-bounded key/value cache
//!
//! A read never returns an entry whose deadline has passed; expired entries
//! are dropped lazily on read, or in bulk by `purge_expired` and the optional
//! janitor task.

mod ttl_cache;
mod types;

#[cfg(test)]
mod tests;

pub use ttl_cache::TtlCache;
pub use types::{CacheConfig, CacheLookup, CacheStats};
