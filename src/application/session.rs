//! QueueSession - Wires the queue components over one live channel.
//!
//! # Architecture
//!
//! ```text
//!             ChannelEvent (pump)                      user commands
//!                    │                                       │
//!   Connected ───────┼──► SubscriptionManager::resubscribe   │
//!                    └──► PositionResolver::refresh          │
//!   Disconnected ────────► PositionResolver::invalidate      │
//!                    └──► Notice::ConnectionLost             │
//!   RosterUpdated ───────► SubscriptionManager::apply        │
//!   ServerError ─────────► Notice::ServerError               ▼
//!                                           view_stop / enter / exit / change_stop
//!                                                            │
//!                               QueueView::derive ◄──────────┘
//! ```
//!
//! On every `Connected` the viewed stop is re-subscribed and the position is
//! re-resolved exactly once each; nothing from an earlier connection is
//! trusted.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::foundation::{AuthenticatedDriver, StopId};
use crate::domain::queue::{ActionOutcome, ExitReason, MyPosition};
use crate::ports::{ChannelError, ChannelEvent, ConnectionStatus, QueueChannel};

use super::coordinator::MembershipCoordinator;
use super::notices::{Notice, Notifier};
use super::position::PositionResolver;
use super::subscription::SubscriptionManager;
use super::view_model::QueueView;

pub struct QueueSession {
    channel: Arc<dyn QueueChannel>,
    subscriptions: Arc<SubscriptionManager>,
    position: Arc<PositionResolver>,
    coordinator: Arc<MembershipCoordinator>,
    notifier: Notifier,
    driver: Option<AuthenticatedDriver>,
}

impl QueueSession {
    /// Builds the components over `channel`.
    ///
    /// `driver` is the signed-in identity, used only to flag "my" rows.
    pub fn new(channel: Arc<dyn QueueChannel>, driver: Option<AuthenticatedDriver>) -> Self {
        let notifier = Notifier::default();
        let position = Arc::new(PositionResolver::new(channel.clone()));
        let coordinator = Arc::new(MembershipCoordinator::new(
            channel.clone(),
            position.clone(),
            notifier.clone(),
        ));
        Self {
            subscriptions: Arc::new(SubscriptionManager::new(channel.clone())),
            channel,
            position,
            coordinator,
            notifier,
            driver,
        }
    }

    pub fn driver(&self) -> Option<&AuthenticatedDriver> {
        self.driver.as_ref()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.channel.status()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.channel.watch_status()
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    pub fn position(&self) -> &Arc<PositionResolver> {
        &self.position
    }

    pub fn coordinator(&self) -> &Arc<MembershipCoordinator> {
        &self.coordinator
    }

    /// Fires when an action starts or finishes.
    pub fn watch_busy(&self) -> watch::Receiver<bool> {
        self.coordinator.watch_busy()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Current render-ready view.
    pub fn view(&self) -> QueueView {
        QueueView::derive(
            &self.channel.status(),
            &self.position.snapshot(),
            &self.subscriptions.snapshot(),
            self.driver.as_ref().map(|d| d.id),
            self.coordinator.is_busy(),
        )
    }

    /// Switch the screen to `stop_id`.
    ///
    /// # Errors
    ///
    /// Channel failures. The stop stays selected and is subscribed on the
    /// next connect.
    pub async fn view_stop(&self, stop_id: StopId) -> Result<(), ChannelError> {
        self.subscriptions.subscribe(stop_id).await
    }

    /// Leave the current screen.
    ///
    /// # Errors
    ///
    /// Channel failure from the unsubscribe.
    pub async fn leave_view(&self) -> Result<(), ChannelError> {
        self.subscriptions.unsubscribe().await
    }

    pub async fn enter(&self, stop_id: StopId) -> ActionOutcome {
        self.coordinator.enter(stop_id).await
    }

    pub async fn exit(&self, reason: ExitReason, observations: Option<String>) -> ActionOutcome {
        self.coordinator.exit(reason, observations).await
    }

    pub async fn change_stop(
        &self,
        new_stop_id: StopId,
        observations: Option<String>,
    ) -> ActionOutcome {
        self.coordinator.change_stop(new_stop_id, observations).await
    }

    /// Manual position refresh.
    ///
    /// # Errors
    ///
    /// Channel failures.
    pub async fn refresh_position(&self) -> Result<MyPosition, ChannelError> {
        self.position.refresh().await
    }

    /// React to one channel event.
    pub async fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected(connection_id) => {
                info!(%connection_id, "connected, resynchronizing");
                match self.subscriptions.resubscribe().await {
                    Ok(Some(stop_id)) => debug!(%stop_id, "viewed stop restored"),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "re-subscribe after connect failed"),
                }
                if let Err(e) = self.position.refresh().await {
                    warn!(error = %e, "position refresh after connect failed");
                }
            }
            ChannelEvent::Disconnected { reason } => {
                self.position.invalidate();
                self.notifier.publish(Notice::ConnectionLost { reason });
            }
            ChannelEvent::RosterUpdated(queue) => {
                self.subscriptions.apply(queue);
            }
            ChannelEvent::ServerError(message) => {
                self.notifier.publish(Notice::ServerError { message });
            }
        }
    }

    /// Consume channel events until the channel goes away.
    pub fn spawn_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                session.handle_event(event).await;
            }
            debug!("event pump finished");
        })
    }
}
