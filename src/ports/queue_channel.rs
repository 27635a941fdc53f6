//! QueueChannel port - The live channel to the queue server.
//!
//! One persistent bidirectional channel per authenticated session. It
//! carries fire-and-forget subscription control, correlated request/response
//! exchanges, and unsolicited pushes.
//!
//! The application layer only sees this trait. The websocket adapter's
//! `ConnectionManager` is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::foundation::StopId;
use crate::domain::queue::{ActionOutcome, ExitReason, MyPosition, StopQueue};

/// Identifies one live transport connection (for logs and event matching).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable liveness of the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub last_error: Option<String>,
    pub connection_id: Option<ConnectionId>,
}

impl ConnectionStatus {
    pub fn connected(connection_id: ConnectionId) -> Self {
        Self {
            is_connected: true,
            last_error: None,
            connection_id: Some(connection_id),
        }
    }

    pub fn disconnected(last_error: Option<String>) -> Self {
        Self {
            is_connected: false,
            last_error,
            connection_id: None,
        }
    }
}

/// Events delivered by the channel to its single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Transport reported connected. Nothing from a previous connection
    /// survives: subscriptions and position must be re-established.
    Connected(ConnectionId),

    /// Transport went away.
    Disconnected { reason: Option<String> },

    /// Full roster snapshot pushed for a subscribed stop.
    RosterUpdated(StopQueue),

    /// Out-of-band error pushed by the server, not tied to any request.
    ServerError(String),
}

/// Errors from channel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,

    #[error("connection lost before a reply arrived")]
    ConnectionLost,

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("channel has been shut down")]
    Closed,
}

/// Port for the live queue channel.
///
/// # Contract
///
/// - Every method fails fast with `ChannelError::NotConnected` when no
///   transport is up. Nothing is queued for later delivery.
/// - Request methods resolve exactly once: with the correlated reply, or with
///   `ConnectionLost` / `Timeout`.
/// - `subscribe`/`unsubscribe` are fire-and-forget; the server acknowledges
///   implicitly.
#[async_trait]
pub trait QueueChannel: Send + Sync {
    /// Current liveness.
    fn status(&self) -> ConnectionStatus;

    /// Receiver notified on every liveness change.
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Start receiving roster pushes for a stop.
    async fn subscribe(&self, stop_id: StopId) -> Result<(), ChannelError>;

    /// Stop receiving roster pushes for a stop.
    async fn unsubscribe(&self, stop_id: StopId) -> Result<(), ChannelError>;

    /// One-shot roster fetch.
    async fn fetch_roster(&self, stop_id: StopId) -> Result<StopQueue, ChannelError>;

    /// Ask to join the queue at `stop_id`.
    async fn enter(&self, stop_id: StopId) -> Result<ActionOutcome, ChannelError>;

    /// Ask to leave the current queue.
    async fn exit(
        &self,
        reason: ExitReason,
        observations: Option<String>,
    ) -> Result<ActionOutcome, ChannelError>;

    /// Ask to leave the current queue and join `new_stop_id` in one step.
    async fn change_stop(
        &self,
        new_stop_id: StopId,
        observations: Option<String>,
    ) -> Result<ActionOutcome, ChannelError>;

    /// One-shot personal position fetch.
    async fn my_position(&self) -> Result<MyPosition, ChannelError>;
}
