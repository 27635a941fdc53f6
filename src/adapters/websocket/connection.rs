//! Connection manager for the live queue channel.
//!
//! Owns exactly one transport per session and supervises it:
//! 1. Read the session token (no token, no connection attempt)
//! 2. Open the transport and publish `Connected`
//! 3. Pump outgoing frames, route replies to pending requests, forward pushes
//! 4. On unsolicited loss: fail pending requests, publish `Disconnected`,
//!    back off and reconnect with a freshly read token
//! 5. On shutdown: close the transport, emit nothing further, refuse reuse
//!
//! Nothing survives a reconnect. Consumers are told `Connected` again and
//! must re-subscribe and re-resolve their own state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::foundation::StopId;
use crate::domain::queue::{ActionOutcome, ExitReason, MyPosition, StopQueue};
use crate::ports::{
    ChannelError, ChannelEvent, ConnectionId, ConnectionStatus, Connector, QueueChannel,
    TokenStore, Transport, TransportError,
};

use super::messages::{ClientMessage, Incoming, RequestId, ServerMessage, ServerReply};
use super::pending::PendingRequests;

/// Timeout and reconnect policy for a [`ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// How long a request waits for its reply before failing.
    pub request_timeout: Duration,
    /// Reconnect after an unsolicited transport loss.
    pub auto_reconnect: bool,
    /// First reconnect delay; doubles on each failed attempt.
    pub reconnect_initial_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Give up after this many consecutive failures (0 = never).
    pub max_reconnect_attempts: u32,
    /// How long `shutdown` waits for the supervisor before aborting it.
    pub shutdown_timeout: Duration,
}

impl ConnectionSettings {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_initial_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            auto_reconnect: true,
            reconnect_initial_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 0,
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

/// State shared between the manager handle and its supervisor task.
struct Shared {
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenStore>,
    settings: ConnectionSettings,
    status: watch::Sender<ConnectionStatus>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: PendingRequests,
    events: mpsc::UnboundedSender<ChannelEvent>,
    closed: AtomicBool,
}

/// A transport that is up, with the receiving end of its outgoing queue.
struct LiveChannel {
    id: ConnectionId,
    transport: Box<dyn Transport>,
    outgoing: mpsc::UnboundedReceiver<String>,
}

enum ChannelExit {
    Shutdown,
    Lost(Option<String>),
}

impl Shared {
    fn emit(&self, event: ChannelEvent) {
        if self.closed.load(Ordering::Acquire) {
            debug!("channel shut down, dropping event");
            return;
        }
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    async fn open(&self, token: &SecretString) -> Result<LiveChannel, TransportError> {
        let transport = self.connector.connect(token).await?;
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outgoing.lock().await = Some(tx);
        self.status.send_replace(ConnectionStatus::connected(id));
        info!(connection_id = %id, "queue channel connected");
        self.emit(ChannelEvent::Connected(id));
        Ok(LiveChannel {
            id,
            transport,
            outgoing: rx,
        })
    }

    async fn lose(&self, id: ConnectionId, reason: Option<String>) {
        *self.outgoing.lock().await = None;
        let failed = self.pending.fail_all().await;
        self.status
            .send_replace(ConnectionStatus::disconnected(reason.clone()));
        warn!(
            connection_id = %id,
            failed_requests = failed,
            reason = reason.as_deref().unwrap_or("closed by server"),
            "queue channel disconnected"
        );
        self.emit(ChannelEvent::Disconnected { reason });
    }

    async fn dispatch(&self, id: ConnectionId, frame: &str) {
        let msg: ServerMessage = match serde_json::from_str(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "undecodable server frame");
                return;
            }
        };

        match Incoming::from(msg) {
            Incoming::Reply(request_id, reply) => {
                if !self.pending.resolve(request_id, reply).await {
                    debug!(%request_id, "reply for unknown or expired request");
                }
            }
            Incoming::RosterUpdated(queue) => {
                debug!(stop_id = %queue.stop_id, vehicles = queue.vehicles.len(), "roster pushed");
                self.emit(ChannelEvent::RosterUpdated(queue));
            }
            Incoming::Error(message) => {
                warn!(connection_id = %id, error = %message, "server pushed an error");
                self.emit(ChannelEvent::ServerError(message));
            }
        }
    }
}

async fn run_channel(
    shared: &Shared,
    live: &mut LiveChannel,
    shutdown: &mut watch::Receiver<bool>,
) -> ChannelExit {
    loop {
        if *shutdown.borrow() {
            let _ = live.transport.close().await;
            return ChannelExit::Shutdown;
        }

        tokio::select! {
            frame = live.outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = live.transport.send(frame).await {
                        return ChannelExit::Lost(Some(e.to_string()));
                    }
                }
                None => {
                    let _ = live.transport.close().await;
                    return ChannelExit::Shutdown;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = live.transport.close().await;
                    return ChannelExit::Shutdown;
                }
            }
            incoming = live.transport.recv() => match incoming {
                Some(Ok(frame)) => shared.dispatch(live.id, &frame).await,
                Some(Err(e)) => return ChannelExit::Lost(Some(e.to_string())),
                None => return ChannelExit::Lost(None),
            },
        }
    }
}

async fn supervise(
    shared: Arc<Shared>,
    first: Option<LiveChannel>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut live = first;
    let mut attempt: u32 = 0;

    loop {
        if let Some(mut channel) = live.take() {
            attempt = 0;
            match run_channel(&shared, &mut channel, &mut shutdown).await {
                ChannelExit::Shutdown => break,
                ChannelExit::Lost(reason) => shared.lose(channel.id, reason).await,
            }
        }

        if !shared.settings.auto_reconnect {
            break;
        }

        attempt += 1;
        let max = shared.settings.max_reconnect_attempts;
        if max > 0 && attempt > max {
            warn!(attempts = max, "giving up reconnecting");
            break;
        }

        let delay = shared.settings.backoff(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() || shared.closed.load(Ordering::Acquire) {
            break;
        }

        let Some(token) = shared.tokens.token().await else {
            info!("session token gone, staying disconnected");
            shared
                .status
                .send_replace(ConnectionStatus::disconnected(None));
            break;
        };

        match shared.open(&token).await {
            Ok(channel) => live = Some(channel),
            Err(e) => {
                warn!(attempt, error = %e, "reconnect failed");
                shared
                    .status
                    .send_replace(ConnectionStatus::disconnected(Some(e.to_string())));
            }
        }
    }

    debug!("connection supervisor exited");
}

struct Supervisor {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Owns the single live queue channel for a session.
///
/// Implements [`QueueChannel`]. Events are read from the receiver returned by
/// [`ConnectionManager::take_events`]; there is exactly one consumer.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    supervisor: Mutex<Option<Supervisor>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenStore>,
        settings: ConnectionSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            shared: Arc::new(Shared {
                connector,
                tokens,
                settings,
                status,
                outgoing: Mutex::new(None),
                pending: PendingRequests::new(),
                events: events_tx,
                closed: AtomicBool::new(false),
            }),
            events: Some(events_rx),
            supervisor: Mutex::new(None),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }

    /// Open the channel and start supervising it.
    ///
    /// Without a session token this quietly leaves the manager disconnected.
    /// A failed first attempt is recorded in `last_error` and retried in the
    /// background when reconnecting is enabled. Calling `connect` while a
    /// channel is already supervised is a no-op.
    ///
    /// # Errors
    ///
    /// `ChannelError::Closed` after [`shutdown`](Self::shutdown).
    pub async fn connect(&self) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let mut supervisor = self.supervisor.lock().await;
        if supervisor
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
        {
            debug!("queue channel already supervised");
            return Ok(());
        }

        let Some(token) = self.shared.tokens.token().await else {
            debug!("no session token, not connecting");
            self.shared
                .status
                .send_replace(ConnectionStatus::disconnected(None));
            return Ok(());
        };

        let first = match self.shared.open(&token).await {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!(error = %e, "queue channel connect failed");
                self.shared
                    .status
                    .send_replace(ConnectionStatus::disconnected(Some(e.to_string())));
                if !self.shared.settings.auto_reconnect {
                    return Ok(());
                }
                None
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(self.shared.clone(), first, shutdown_rx));
        *supervisor = Some(Supervisor {
            task,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Close the channel for good. Later `connect` calls are refused and no
    /// further events are delivered.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let supervisor = self.supervisor.lock().await.take();
        if let Some(Supervisor { mut task, shutdown }) = supervisor {
            let _ = shutdown.send(true);
            if tokio::time::timeout(self.shared.settings.shutdown_timeout, &mut task)
                .await
                .is_err()
            {
                warn!("connection supervisor did not stop in time, aborting");
                task.abort();
            }
        }

        *self.shared.outgoing.lock().await = None;
        self.shared.pending.fail_all().await;
        self.shared
            .status
            .send_replace(ConnectionStatus::disconnected(None));
        info!("queue channel shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    async fn send(&self, msg: &ClientMessage) -> Result<(), ChannelError> {
        let frame =
            serde_json::to_string(msg).map_err(|e| ChannelError::Serialization(e.to_string()))?;
        let outgoing = self.shared.outgoing.lock().await;
        let tx = outgoing.as_ref().ok_or(ChannelError::NotConnected)?;
        tx.send(frame).map_err(|_| ChannelError::NotConnected)?;
        debug!(kind = msg.kind(), request_id = ?msg.request_id(), "frame queued");
        Ok(())
    }

    async fn request<F>(&self, build: F) -> Result<ServerReply, ChannelError>
    where
        F: FnOnce(RequestId) -> ClientMessage + Send,
    {
        let connected = self.shared.status.borrow().is_connected;
        if !connected {
            return Err(ChannelError::NotConnected);
        }

        let (id, rx) = self.shared.pending.register().await;
        let msg = build(id);
        if let Err(e) = self.send(&msg).await {
            self.shared.pending.cancel(id).await;
            return Err(e);
        }

        let timeout = self.shared.settings.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ChannelError::ConnectionLost),
            Err(_) => {
                self.shared.pending.cancel(id).await;
                warn!(request_id = %id, kind = msg.kind(), "request timed out");
                Err(ChannelError::Timeout(timeout))
            }
        }
    }

    async fn action<F>(&self, kind: &'static str, build: F) -> Result<ActionOutcome, ChannelError>
    where
        F: FnOnce(RequestId) -> ClientMessage + Send,
    {
        match self.request(build).await? {
            ServerReply::Action(outcome) => Ok(outcome),
            _ => Err(ChannelError::UnexpectedReply(kind)),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            let _ = supervisor.shutdown.send(true);
        }
    }
}

#[async_trait]
impl QueueChannel for ConnectionManager {
    fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    async fn subscribe(&self, stop_id: StopId) -> Result<(), ChannelError> {
        self.send(&ClientMessage::Subscribe { stop_id }).await
    }

    async fn unsubscribe(&self, stop_id: StopId) -> Result<(), ChannelError> {
        self.send(&ClientMessage::Unsubscribe { stop_id }).await
    }

    async fn fetch_roster(&self, stop_id: StopId) -> Result<StopQueue, ChannelError> {
        match self
            .request(|request_id| ClientMessage::GetRoster {
                request_id,
                stop_id,
            })
            .await?
        {
            ServerReply::Roster(queue) => Ok(queue),
            _ => Err(ChannelError::UnexpectedReply("get_roster")),
        }
    }

    async fn enter(&self, stop_id: StopId) -> Result<ActionOutcome, ChannelError> {
        self.action("enter", |request_id| ClientMessage::Enter {
            request_id,
            stop_id,
        })
        .await
    }

    async fn exit(
        &self,
        reason: ExitReason,
        observations: Option<String>,
    ) -> Result<ActionOutcome, ChannelError> {
        self.action("exit", |request_id| ClientMessage::Exit {
            request_id,
            reason,
            observations,
        })
        .await
    }

    async fn change_stop(
        &self,
        new_stop_id: StopId,
        observations: Option<String>,
    ) -> Result<ActionOutcome, ChannelError> {
        self.action("change_stop", |request_id| ClientMessage::ChangeStop {
            request_id,
            new_stop_id,
            observations,
        })
        .await
    }

    async fn my_position(&self) -> Result<MyPosition, ChannelError> {
        match self
            .request(|request_id| ClientMessage::MyPosition { request_id })
            .await?
        {
            ServerReply::Position(position) => Ok(position),
            _ => Err(ChannelError::UnexpectedReply("my_position")),
        }
    }
}
