//! Core error type for Bulwark

use thiserror::Error;

/// Result type alias for Bulwark operations
pub type BulwarkResult<T> = Result<T, BulwarkError>;

/// Main error type for Bulwark
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BulwarkError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// A configured value violates its documented bounds
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("{format} error: {message}")]
    Parse { format: String, message: String },

    /// The component was shut down before the request could be served
    #[error("{component} is shut down")]
    Shutdown { component: String },
}

impl BulwarkError {
    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "BULWARK_CONFIG",
            Self::InvalidValue { .. } => "BULWARK_INVALID_VALUE",
            Self::Io { .. } => "BULWARK_IO",
            Self::Parse { .. } => "BULWARK_PARSE",
            Self::Shutdown { .. } => "BULWARK_SHUTDOWN",
        }
    }

    /// Additional context attached to the error, if any
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Config { context, .. } => context.as_deref(),
            Self::Io { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}
