//! Top-level configuration model

use serde::{Deserialize, Serialize};

use super::logging_config::LoggingConfig;
use crate::cache::CacheConfig;
use crate::error::BulwarkResult;
use crate::events::EventBusConfig;
use crate::recovery::{CircuitBreakerConfig, RetryPolicy};

/// Configuration for every component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulwarkConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub event_bus: EventBusConfig,
    pub logging: LoggingConfig,
}

impl BulwarkConfig {
    /// Check every section; the first violation wins
    pub fn validate(&self) -> BulwarkResult<()> {
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.cache.validate()?;
        self.event_bus.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let config = BulwarkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.circuit_breaker.failure_threshold(), 5);
        assert_eq!(config.retry.max_attempts(), 3);
    }

    #[test]
    fn test_serde_roundtrip_keeps_humantime_durations() {
        let config = BulwarkConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["circuit_breaker"]["reset_timeout"], "30s");
        assert_eq!(json["retry"]["base_delay"], "100ms");

        let back: BulwarkConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: BulwarkConfig =
            serde_json::from_str(r#"{"retry": {"max_attempts": 7}}"#).unwrap();
        assert_eq!(config.retry.max_attempts(), 7);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(100));
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<BulwarkConfig, _> = serde_json::from_str(r#"{"retries": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_reports_first_bad_section() {
        let mut config = BulwarkConfig::default();
        config.cache.default_ttl = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.default_ttl"));
    }

    #[test]
    fn test_out_of_range_sections_fail_to_deserialize() {
        let negative: Result<BulwarkConfig, _> =
            serde_json::from_str(r#"{"retry": {"backoff_multiplier": -2.0}}"#);
        assert!(negative.unwrap_err().to_string().contains("retry.backoff_multiplier"));

        let zero: Result<BulwarkConfig, _> =
            serde_json::from_str(r#"{"circuit_breaker": {"failure_threshold": 0}}"#);
        assert!(zero.unwrap_err().to_string().contains("circuit_breaker.failure_threshold"));
    }
}
