//! In-memory token store.
//!
//! Holds the session token handed over by whatever performed the login.
//! Setting or clearing it takes effect on the next connect or reconnect.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::ports::TokenStore;

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    token: RwLock<Option<SecretString>>,
}

impl InMemoryTokenStore {
    /// Creates a logged-out store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(SecretString::new(token.into()))),
        }
    }

    pub async fn set(&self, token: SecretString) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn token(&self) -> Option<SecretString> {
        self.token.read().await.clone()
    }
}
