//! QueueClient - Composition root for one signed-in driver.
//!
//! Builds a [`ConnectionManager`] over any [`Connector`], wires it into a
//! [`QueueSession`], starts the event pump and opens the channel.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::auth::driver_from_token;
use crate::adapters::websocket::{ConnectionManager, ConnectionSettings};
use crate::application::QueueSession;
use crate::domain::foundation::AuthenticatedDriver;
use crate::ports::{ChannelError, Connector, TokenStore};

pub struct QueueClient {
    manager: Arc<ConnectionManager>,
    session: Arc<QueueSession>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl QueueClient {
    /// Wire everything up and open the channel.
    ///
    /// The driver identity is read from the current token. A token that
    /// does not decode only disables "my row" highlighting; the server
    /// remains the judge of whether the token is valid.
    ///
    /// # Errors
    ///
    /// `ChannelError::Closed` if the manager was already shut down.
    pub async fn start(
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenStore>,
        settings: ConnectionSettings,
    ) -> Result<Self, ChannelError> {
        let driver = resolve_driver(tokens.as_ref()).await;

        let mut manager = ConnectionManager::new(connector, tokens, settings);
        let events = manager.take_events().ok_or(ChannelError::Closed)?;
        let manager = Arc::new(manager);

        let session = Arc::new(QueueSession::new(manager.clone(), driver));
        let pump = session.spawn_pump(events);

        manager.connect().await?;

        Ok(Self {
            manager,
            session,
            pump: Mutex::new(Some(pump)),
        })
    }

    pub fn session(&self) -> &Arc<QueueSession> {
        &self.session
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Close the channel for good and stop the event pump.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        info!("queue client stopped");
    }
}

async fn resolve_driver(tokens: &dyn TokenStore) -> Option<AuthenticatedDriver> {
    let token = tokens.token().await?;
    match driver_from_token(&token) {
        Ok(driver) => {
            info!(driver_id = %driver.id, "signed in");
            Some(driver)
        }
        Err(e) => {
            warn!(error = %e, "driver identity unavailable");
            None
        }
    }
}
