//! Logging configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BulwarkError, BulwarkResult};

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Compact => "compact",
        })
    }
}

impl FromStr for LogFormat {
    type Err = BulwarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(BulwarkError::invalid_value(
                "logging.format",
                format!("unknown format '{other}', expected pretty, json or compact"),
            )),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directives (e.g. `info,bulwark_core=debug`)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Check each directive's level. Directives are `level` or `target=level`.
    pub fn validate(&self) -> BulwarkResult<()> {
        if self.level.trim().is_empty() {
            return Err(BulwarkError::invalid_value(
                "logging.level",
                "must not be empty",
            ));
        }
        for directive in self.level.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let level = directive.rsplit('=').next().unwrap_or(directive);
            let is_level = LEVELS.contains(&level.to_ascii_lowercase().as_str());
            // A bare target (`bulwark_core`) is a valid directive too.
            if !is_level && directive.contains('=') {
                return Err(BulwarkError::invalid_value(
                    "logging.level",
                    format!("unknown level '{level}' in directive '{directive}'"),
                ));
            }
        }
        Ok(())
    }
}
