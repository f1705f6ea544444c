//! From trait implementations for BulwarkError conversions

use super::types::BulwarkError;

impl From<std::io::Error> for BulwarkError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for BulwarkError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse("JSON", error.to_string())
    }
}

impl From<serde_yaml::Error> for BulwarkError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::parse("YAML", error.to_string())
    }
}

impl From<toml::de::Error> for BulwarkError {
    fn from(error: toml::de::Error) -> Self {
        Self::parse("TOML", error.to_string())
    }
}
