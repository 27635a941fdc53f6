//! TokenStore port - Source of the session credential.
//!
//! Login and token refresh are handled elsewhere; the queue client only
//! reads whatever token the session currently holds.

use async_trait::async_trait;
use secrecy::SecretString;

/// Read access to the current session token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The current token, or `None` when the session is logged out.
    async fn token(&self) -> Option<SecretString>;
}
