//! Application configuration module
//!
//! This module provides type-safe configuration loading from an optional
//! config file and environment variables using the `config` and `dotenvy`
//! crates. Environment variables use the `ZONE_QUEUE` prefix and nested
//! values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use zone_queue::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Queue channel at {}", config.channel.ws_url);
//! ```

mod api;
mod channel;
mod client;
mod error;
mod session;

pub use api::ApiConfig;
pub use channel::ChannelConfig;
pub use client::{ClientConfig, Environment};
pub use error::{ConfigError, ValidationError};
pub use session::SessionConfig;

use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an optional config file (TOML, YAML or JSON).
pub const CONFIG_FILE_ENV: &str = "ZONE_QUEUE_CONFIG";

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a usable
/// development configuration. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Process settings (environment, logging)
    #[serde(default)]
    pub client: ClientConfig,

    /// Live queue channel (websocket URL, timeouts, reconnect policy)
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Stop administration REST API
    #[serde(default)]
    pub api: ApiConfig,

    /// Session credential
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads the file named by `ZONE_QUEUE_CONFIG`, if set
    /// 3. Overlays environment variables with `ZONE_QUEUE` prefix
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ZONE_QUEUE__CHANNEL__WS_URL=wss://...` -> `channel.ws_url = ...`
    /// - `ZONE_QUEUE__SESSION__TOKEN=eyJ...` -> `session.token = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or values cannot be
    /// parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref().map(Path::new))
    }

    /// Load configuration from an explicit file plus the environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or malformed, or values
    /// cannot be parsed into expected types.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::default()
                    .prefix("ZONE_QUEUE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.client.validate()?;
        self.channel.validate(&self.client.environment)?;
        self.api.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.client.is_production()
    }
}
