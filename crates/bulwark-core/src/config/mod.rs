//! Configuration management
//!
//! Sources are layered in order (defaults, file, environment, explicit
//! overrides) and merged field by field before one final validation pass.

pub mod env_loader;
pub mod file_loader;
pub mod loader;
pub mod logging_config;
pub mod model;
pub mod overrides;

pub use file_loader::{ConfigFormat, load_from_file};
pub use loader::{ConfigLoader, ConfigSource, load_config};
pub use logging_config::{LogFormat, LoggingConfig};
pub use model::BulwarkConfig;
