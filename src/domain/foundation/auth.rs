//! Authentication types for the domain layer.
//!
//! The session token itself is issued and verified by the backend. The
//! client only needs to know *which driver* the token belongs to, so that
//! roster entries can be flagged as "mine".

use super::DriverId;
use thiserror::Error;

/// Driver identity extracted from the session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedDriver {
    /// Driver id as known to the queue server.
    pub id: DriverId,

    /// Display name if the token carries one.
    pub display_name: Option<String>,
}

impl AuthenticatedDriver {
    /// Creates a new authenticated driver.
    pub fn new(id: DriverId, display_name: Option<String>) -> Self {
        Self { id, display_name }
    }

    /// Returns the display name, or the numeric id as fallback.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| format!("driver #{}", self.id))
    }
}

/// Errors that occur when reading identity from a session token.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing or malformed.
    #[error("Invalid session token")]
    InvalidToken,

    /// The token decodes but names no driver.
    #[error("Session token carries no driver id")]
    MissingDriverId,
}

impl AuthError {
    /// Returns true if the user must log in again to obtain a usable token.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::MissingDriverId)
    }
}
