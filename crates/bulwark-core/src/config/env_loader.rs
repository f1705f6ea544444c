//! Environment variable-based configuration loading
//!
//! Each overridable setting `section.field` maps to `BULWARK_SECTION_FIELD`,
//! e.g. `retry.base_delay` is read from `BULWARK_RETRY_BASE_DELAY`.

use serde_json::Value;
use std::env;

use super::overrides::{known_keys, patch_from_overrides};
use crate::error::BulwarkResult;

pub const ENV_PREFIX: &str = "BULWARK_";

/// Environment variable name for a dotted configuration key
pub fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "_").to_ascii_uppercase())
}

/// Load overrides from the process environment
pub fn load_from_env() -> BulwarkResult<Value> {
    load_from_vars(env::vars())
}

/// Load overrides from an explicit set of variables
pub fn load_from_vars<I>(vars: I) -> BulwarkResult<Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .collect();

    let mut overrides = Vec::new();
    for key in known_keys() {
        let name = env_var_name(key);
        if let Some((_, value)) = vars.iter().find(|(n, _)| *n == name) {
            tracing::debug!(variable = %name, "Config override from environment");
            overrides.push((key, value.as_str()));
        }
    }

    patch_from_overrides(overrides, "environment")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            env_var_name("circuit_breaker.failure_threshold"),
            "BULWARK_CIRCUIT_BREAKER_FAILURE_THRESHOLD"
        );
        assert_eq!(env_var_name("logging.level"), "BULWARK_LOGGING_LEVEL");
    }

    #[test]
    fn test_load_from_vars() {
        let patch = load_from_vars(vars(&[
            ("BULWARK_RETRY_MAX_ATTEMPTS", "6"),
            ("BULWARK_LOGGING_FORMAT", "json"),
            ("BULWARK_UNRELATED", "ignored"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();

        assert_eq!(
            patch,
            json!({ "retry": { "max_attempts": 6 }, "logging": { "format": "json" } })
        );
    }

    #[test]
    fn test_invalid_value_is_error() {
        let err = load_from_vars(vars(&[("BULWARK_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("circuit_breaker.failure_threshold"));
    }
}
