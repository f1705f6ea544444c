//! Typed `section.field = value` overrides shared by the environment and
//! command-line sources

use serde_json::{Map, Value};

use crate::error::{BulwarkError, BulwarkResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Integer,
    Float,
    /// humantime string, e.g. `250ms`
    Duration,
    /// humantime string, or `none`/`off` to disable
    OptionalDuration,
    Text,
}

/// Every overridable setting, by dotted path
const KEYS: &[(&str, Kind)] = &[
    ("circuit_breaker.failure_threshold", Kind::Integer),
    ("circuit_breaker.reset_timeout", Kind::Duration),
    ("retry.max_attempts", Kind::Integer),
    ("retry.base_delay", Kind::Duration),
    ("retry.backoff_multiplier", Kind::Float),
    ("cache.default_ttl", Kind::Duration),
    ("cache.janitor_interval", Kind::OptionalDuration),
    ("event_bus.handler_timeout", Kind::OptionalDuration),
    ("logging.level", Kind::Text),
    ("logging.format", Kind::Text),
];

/// Dotted paths accepted by [`patch_from_overrides`]
pub fn known_keys() -> impl Iterator<Item = &'static str> {
    KEYS.iter().map(|(key, _)| *key)
}

/// Build a JSON patch from `(dotted.path, raw value)` pairs
pub fn patch_from_overrides<'a, I>(overrides: I, origin: &str) -> BulwarkResult<Value>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut patch = Map::new();
    for (key, raw) in overrides {
        let kind = KEYS
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                BulwarkError::config_with_context(
                    format!("Unknown configuration key '{key}'"),
                    format!("Applying {origin} overrides"),
                )
            })?;

        let value = parse_value(key, raw, kind).map_err(|message| {
            BulwarkError::config_with_context(message, format!("Applying {origin} overrides"))
        })?;

        let (section, field) = key.split_once('.').unwrap_or((key, ""));
        let entry = patch
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(fields) = entry {
            fields.insert(field.to_string(), value);
        }
    }
    Ok(Value::Object(patch))
}

fn parse_value(key: &str, raw: &str, kind: Kind) -> Result<Value, String> {
    let raw = raw.trim();
    match kind {
        Kind::Integer => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| format!("Invalid value '{raw}' for {key}: expected a non-negative integer")),
        Kind::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("Invalid value '{raw}' for {key}: expected a number")),
        Kind::OptionalDuration if matches!(raw.to_ascii_lowercase().as_str(), "none" | "off") => {
            Ok(Value::Null)
        }
        Kind::Duration | Kind::OptionalDuration | Kind::Text => Ok(Value::String(raw.to_string())),
    }
}

/// Recursively merge `patch` into `base`. Objects merge key by key; any
/// other value in `patch` replaces the one in `base`.
pub fn merge_values(base: &mut Value, patch: Value) {
    match patch {
        Value::Object(patch) => {
            if !base.is_object() {
                *base = Value::Object(Map::new());
            }
            if let Value::Object(base) = base {
                for (key, value) in patch {
                    match base.get_mut(&key) {
                        Some(existing) => merge_values(existing, value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
        }
        patch => *base = patch,
    }
}
