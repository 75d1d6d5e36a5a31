//! Facade error types

use std::path::PathBuf;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Invalid configuration
    #[error("Invalid logging configuration: {0}")]
    InvalidConfiguration(String),

    /// Tracing subscriber error
    #[error("Tracing subscriber error: {0}")]
    TracingError(String),
}

/// Sync bridge errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The session task has stopped
    #[error("Session task is no longer running")]
    Closed,

    /// The signal queue is full (only from non-blocking dispatch)
    #[error("Session signal queue is full")]
    Full,
}
