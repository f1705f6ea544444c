//! Layered configuration loading

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::env_loader;
use super::file_loader;
use super::model::BulwarkConfig;
use super::overrides::{merge_values, patch_from_overrides};
use crate::error::{BulwarkError, BulwarkResult};

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// A file that must exist
    File(PathBuf),
    /// A file that is skipped when absent
    OptionalFile(PathBuf),
    /// `BULWARK_*` environment variables
    Environment,
    /// Explicit `section.field = value` pairs, e.g. from command-line flags
    Overrides(Vec<(String, String)>),
}

/// Configuration loader merging several sources in order; later sources win
/// field by field.
///
/// ```no_run
/// use bulwark_core::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("bulwark.toml")
///     .with_env()
///     .load()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::OptionalFile(path.as_ref().to_path_buf()))
    }

    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    pub fn with_overrides<K, V>(self, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let overrides = overrides
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.add_source(ConfigSource::Overrides(overrides))
    }

    /// Merge all sources, then deserialize and validate the result
    pub fn load(self) -> BulwarkResult<BulwarkConfig> {
        let mut merged = serde_json::to_value(BulwarkConfig::default())?;

        for source in &self.sources {
            if let Some(patch) = load_from_source(source)? {
                merge_values(&mut merged, patch);
            }
        }

        let config: BulwarkConfig = serde_json::from_value(merged).map_err(|e| {
            BulwarkError::config_with_context(
                format!("Invalid configuration: {e}"),
                "Merging configuration sources",
            )
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn load_from_source(source: &ConfigSource) -> BulwarkResult<Option<Value>> {
    match source {
        ConfigSource::Default => {
            tracing::debug!("Loading default config");
            Ok(Some(serde_json::to_value(BulwarkConfig::default())?))
        }
        ConfigSource::File(path) => {
            tracing::debug!(path = %path.display(), "Loading config from file");
            file_loader::load_value_from_file(path).map(Some)
        }
        ConfigSource::OptionalFile(path) if !path.exists() => {
            tracing::debug!(path = %path.display(), "Optional config file not found");
            Ok(None)
        }
        ConfigSource::OptionalFile(path) => {
            tracing::debug!(path = %path.display(), "Loading config from file");
            file_loader::load_value_from_file(path).map(Some)
        }
        ConfigSource::Environment => {
            tracing::debug!("Loading config from environment");
            env_loader::load_from_env().map(Some)
        }
        ConfigSource::Overrides(pairs) => {
            tracing::debug!(count = pairs.len(), "Applying config overrides");
            patch_from_overrides(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())), "command-line")
                .map(Some)
        }
    }
}

/// Defaults, then `path` (if given), then the environment
pub fn load_config(path: Option<&Path>) -> BulwarkResult<BulwarkConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader.with_env().load()
}
