//! File-based configuration loading

use serde_json::Value;
use std::fs;
use std::path::Path;

use super::model::BulwarkConfig;
use crate::error::{BulwarkError, BulwarkResult};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension; anything unrecognised is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::Toml,
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }
}

/// Read a configuration file as an untyped document, for layering
pub fn load_value_from_file(path: &Path) -> BulwarkResult<Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        BulwarkError::io_with_path(
            format!("Failed to read config file: {e}"),
            path.display().to_string(),
        )
    })?;

    let format = ConfigFormat::from_path(path);
    let parsed: Result<Value, String> = match format {
        ConfigFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
    };

    let value = parsed.map_err(|e| {
        BulwarkError::config_with_context(
            format!("Failed to parse {} config: {e}", format.name()),
            format!(
                "Deserializing {} configuration from '{}'",
                format.name(),
                path.display()
            ),
        )
    })?;

    match value {
        // An empty YAML document
        Value::Null => Ok(Value::Object(Default::default())),
        Value::Object(_) => Ok(value),
        other => Err(BulwarkError::config_with_context(
            format!("Expected a table at the top level, found {other}"),
            format!("Reading configuration from '{}'", path.display()),
        )),
    }
}

/// Load a single file on top of the defaults, without validation
pub fn load_from_file(path: &Path) -> BulwarkResult<BulwarkConfig> {
    let value = load_value_from_file(path)?;
    serde_json::from_value(value).map_err(|e| {
        BulwarkError::config_with_context(
            format!("Invalid configuration: {e}"),
            format!("Reading configuration from '{}'", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bulwark.toml");
        fs::write(
            &config_path,
            r#"
[circuit_breaker]
failure_threshold = 3
reset_timeout = "15s"

[retry]
max_attempts = 4
base_delay = "50ms"
backoff_multiplier = 1.5

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold(), 3);
        assert_eq!(config.circuit_breaker.reset_timeout(), Duration::from_secs(15));
        assert_eq!(config.retry.base_delay(), Duration::from_millis(50));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bulwark.yml");
        fs::write(
            &config_path,
            "cache:\n  default_ttl: 2m\n  janitor_interval: ~\nevent_bus:\n  handler_timeout: 5s\n",
        )
        .unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.cache.default_ttl, Duration::from_secs(120));
        assert_eq!(config.cache.janitor_interval, None);
        assert_eq!(config.event_bus.handler_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_load_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bulwark.json");
        fs::write(&config_path, r#"{ "retry": { "max_attempts": 9 } }"#).unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.retry.max_attempts(), 9);
    }

    #[test]
    fn test_empty_yaml_is_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("empty.yaml");
        fs::write(&config_path, "").unwrap();

        assert_eq!(load_from_file(&config_path).unwrap(), BulwarkConfig::default());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_value_from_file(Path::new("/nonexistent/bulwark.toml")).unwrap_err();
        assert_eq!(err.error_code(), "BULWARK_IO");
        assert_eq!(err.context(), Some("/nonexistent/bulwark.toml"));
    }

    #[test]
    fn test_parse_error_has_context() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[retry\nmax_attempts = ").unwrap();

        let err = load_value_from_file(&config_path).unwrap_err();
        assert_eq!(err.error_code(), "BULWARK_CONFIG");
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.conf")), ConfigFormat::Json);
    }
}
