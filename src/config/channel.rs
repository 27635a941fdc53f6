//! Queue channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::client::Environment;
use super::error::ValidationError;
use crate::adapters::websocket::ConnectionSettings;

/// Live channel configuration (websocket endpoint, timeouts, reconnect policy)
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Websocket endpoint of the queue server
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Seconds a request waits for its reply
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Reconnect after the server drops the channel
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial_delay")]
    pub reconnect_initial_delay_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,

    /// Consecutive failed reconnects before giving up (0 = never)
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    /// Milliseconds to wait for a clean close on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl ChannelConfig {
    /// Connection manager settings derived from this section
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            auto_reconnect: self.auto_reconnect,
            reconnect_initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
            reconnect_max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        }
    }

    /// Validate channel configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(ValidationError::InvalidWebSocketUrl);
        }
        if *environment == Environment::Production && !self.ws_url.starts_with("wss://") {
            return Err(ValidationError::WebSocketMustBeSecure);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.reconnect_initial_delay_ms == 0
            || self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms
        {
            return Err(ValidationError::InvalidReconnectDelay);
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            request_timeout_secs: default_request_timeout(),
            auto_reconnect: true,
            reconnect_initial_delay_ms: default_reconnect_initial_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            max_reconnect_attempts: 0,
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

fn default_ws_url() -> String {
    "ws://localhost:3000/queue".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_reconnect_initial_delay() -> u64 {
    500
}

fn default_reconnect_max_delay() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    1_000
}
