//! `bulwark check-config`

use anyhow::Context;
use bulwark_core::config::{ConfigFormat, ConfigLoader};
use std::path::Path;

/// Load `path` over the defaults, apply `overrides`, validate, and render the
/// effective configuration. Environment variables are not consulted so the
/// report reflects the file alone.
pub fn run(path: &Path, overrides: &[(String, String)]) -> anyhow::Result<String> {
    let format = ConfigFormat::from_path(path);

    let config = ConfigLoader::new()
        .with_defaults()
        .with_file(path)
        .with_overrides(overrides.iter().cloned())
        .load()
        .with_context(|| format!("{} is not a valid configuration", path.display()))?;

    tracing::info!(path = %path.display(), ?format, "Configuration is valid");

    let rendered = serde_json::to_string_pretty(&config)?;
    Ok(format!("{} is valid\n{rendered}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_valid_toml_reports_effective_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bulwark.toml");
        fs::write(
            &path,
            "[retry]\nmax_attempts = 4\nbase_delay = \"250ms\"\n",
        )
        .unwrap();

        let report = run(&path, &[]).unwrap();
        assert!(report.contains("is valid"));
        assert!(report.contains("\"max_attempts\": 4"));
        assert!(report.contains("250ms"));
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bulwark.yaml");
        fs::write(&path, "circuit_breaker:\n  failure_threshold: 2\n").unwrap();

        let overrides = vec![(
            "circuit_breaker.failure_threshold".to_string(),
            "9".to_string(),
        )];
        let report = run(&path, &overrides).unwrap();
        assert!(report.contains("\"failure_threshold\": 9"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bulwark.json");
        fs::write(&path, r#"{ "retry": { "max_attempts": 0 } }"#).unwrap();

        let err = run(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("not a valid configuration"));
    }

    #[test]
    fn test_unparseable_file_is_rejected() {
        // Unrecognised extensions are read as JSON.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bulwark.ini");
        fs::write(&path, "retry=1").unwrap();

        assert!(run(&path, &[]).is_err());
    }
}
