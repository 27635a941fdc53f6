//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Queue channel URL must start with ws:// or wss://")]
    InvalidWebSocketUrl,

    #[error("Queue channel must use wss:// in production")]
    WebSocketMustBeSecure,

    #[error("Reconnect initial delay must be positive and not exceed the maximum delay")]
    InvalidReconnectDelay,

    #[error("API base URL must start with http:// or https://")]
    InvalidApiUrl,
}
