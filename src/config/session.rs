//! Session configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Session credential handed to the client at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Session token (JWT) issued by the login service
    pub token: Option<SecretString>,
}

impl SessionConfig {
    /// Whether a non-empty token is configured
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().trim().is_empty())
    }

    /// Validate session configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token.is_some() && !self.has_token() {
            return Err(ValidationError::MissingRequired("SESSION__TOKEN"));
        }
        Ok(())
    }
}
