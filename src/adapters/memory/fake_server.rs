//! In-process queue server and connector.
//!
//! `FakeQueueServer` speaks the same JSON protocol as the real queue server
//! and keeps authoritative queues in memory. `InMemoryConnector` opens
//! transports straight into it, so the full client stack (connection manager,
//! session, coordinator) runs without a network.
//!
//! # Security Note
//!
//! This adapter is for **testing and demos only**. It uses `.expect()` on
//! lock operations which will panic if locks are poisoned.
//!
//! # Example
//!
//! ```ignore
//! let server = FakeQueueServer::new();
//! server.add_stop(Stop::new(StopId::new(5)?, "Toquepala"));
//! server.register_driver("token-42", driver, vehicle);
//!
//! let connector = Arc::new(InMemoryConnector::new(server.clone()));
//! // ... drive a ConnectionManager against it ...
//!
//! assert_eq!(server.count_received("enter"), 1);
//! server.drop_connections(); // simulate a network loss
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapters::websocket::{ClientMessage, RequestId, ServerMessage};
use crate::domain::foundation::{DriverId, QueueId, StopId, Timestamp};
use crate::domain::queue::{Driver, MyPosition, QueueEntry, Stop, StopQueue, Vehicle};
use crate::ports::{Connector, Transport, TransportError};

type ConnectionKey = u64;

struct Registered {
    driver: Driver,
    vehicle: Vehicle,
}

struct Waiting {
    queue_id: QueueId,
    driver_id: DriverId,
    entry_time: Timestamp,
}

struct Connection {
    driver_id: DriverId,
    subscriptions: HashSet<StopId>,
    outbox: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct ServerState {
    stops: HashMap<StopId, Stop>,
    drivers: HashMap<String, Registered>,
    queues: HashMap<StopId, Vec<Waiting>>,
    connections: HashMap<ConnectionKey, Connection>,
    received: Vec<ClientMessage>,
    next_connection: ConnectionKey,
    next_queue_id: i64,
    refuse_connections: bool,
    hold_replies: bool,
    reject_next_action: Option<String>,
}

impl ServerState {
    fn driver(&self, id: DriverId) -> Option<&Registered> {
        self.drivers.values().find(|r| r.driver.id == id)
    }

    fn stop_of(&self, driver_id: DriverId) -> Option<StopId> {
        self.queues
            .iter()
            .find(|(_, waiting)| waiting.iter().any(|w| w.driver_id == driver_id))
            .map(|(stop_id, _)| *stop_id)
    }

    fn snapshot(&self, stop_id: StopId) -> StopQueue {
        let now = Timestamp::now();
        let vehicles: Vec<QueueEntry> = self
            .queues
            .get(&stop_id)
            .map(|waiting| {
                waiting
                    .iter()
                    .enumerate()
                    .filter_map(|(index, w)| {
                        let registered = self.driver(w.driver_id)?;
                        Some(QueueEntry {
                            queue_id: w.queue_id,
                            position: index as u32 + 1,
                            driver: registered.driver.clone(),
                            vehicle: registered.vehicle.clone(),
                            entry_time: w.entry_time,
                            wait_time: w.entry_time.minutes_until(&now) as u32,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        StopQueue {
            stop_id,
            total_vehicles: vehicles.len() as u32,
            vehicles,
        }
    }

    fn position_of(&self, driver_id: DriverId) -> MyPosition {
        let Some(stop_id) = self.stop_of(driver_id) else {
            return MyPosition::not_in_queue();
        };
        let waiting = &self.queues[&stop_id];
        let index = waiting
            .iter()
            .position(|w| w.driver_id == driver_id)
            .unwrap_or_default();
        match self.stops.get(&stop_id) {
            Some(stop) => MyPosition::at(stop.clone(), index as u32 + 1, waiting.len() as u32),
            None => MyPosition::not_in_queue(),
        }
    }

    fn join(&mut self, driver_id: DriverId, stop_id: StopId) {
        self.next_queue_id += 1;
        let waiting = Waiting {
            queue_id: QueueId::new(self.next_queue_id),
            driver_id,
            entry_time: Timestamp::now(),
        };
        self.queues.entry(stop_id).or_default().push(waiting);
    }

    fn leave(&mut self, driver_id: DriverId) -> Option<StopId> {
        let stop_id = self.stop_of(driver_id)?;
        if let Some(waiting) = self.queues.get_mut(&stop_id) {
            waiting.retain(|w| w.driver_id != driver_id);
        }
        Some(stop_id)
    }

    fn send_to(&self, key: ConnectionKey, msg: &ServerMessage) {
        if let Some(conn) = self.connections.get(&key) {
            if let Ok(frame) = serde_json::to_string(msg) {
                let _ = conn.outbox.send(frame);
            }
        }
    }

    fn broadcast_roster(&self, stop_id: StopId) {
        let msg = ServerMessage::RosterUpdated {
            queue: self.snapshot(stop_id),
        };
        let keys: Vec<ConnectionKey> = self
            .connections
            .iter()
            .filter(|(_, c)| c.subscriptions.contains(&stop_id))
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            self.send_to(key, &msg);
        }
    }

    fn action_reply(&self, key: ConnectionKey, request_id: RequestId, result: Result<(), String>) {
        let msg = match result {
            Ok(()) => ServerMessage::ActionResult {
                request_id,
                success: true,
                message: None,
            },
            Err(message) => ServerMessage::ActionResult {
                request_id,
                success: false,
                message: Some(message),
            },
        };
        self.send_to(key, &msg);
    }

    fn enter(&mut self, driver_id: DriverId, stop_id: StopId) -> Result<(), String> {
        if self.stop_of(driver_id).is_some() {
            return Err("driver is already in a queue".to_string());
        }
        let stop = self
            .stops
            .get(&stop_id)
            .ok_or_else(|| format!("stop {} does not exist", stop_id))?;
        if !stop.status.accepts_vehicles() {
            return Err(format!("stop {} is not accepting vehicles", stop.name));
        }
        self.join(driver_id, stop_id);
        Ok(())
    }

    fn change(&mut self, driver_id: DriverId, new_stop_id: StopId) -> Result<StopId, String> {
        let current = self
            .stop_of(driver_id)
            .ok_or_else(|| "driver is not in any queue".to_string())?;
        if current == new_stop_id {
            return Err("driver is already at that stop".to_string());
        }
        let stop = self
            .stops
            .get(&new_stop_id)
            .ok_or_else(|| format!("stop {} does not exist", new_stop_id))?;
        if !stop.status.accepts_vehicles() {
            return Err(format!("stop {} is not accepting vehicles", stop.name));
        }
        self.leave(driver_id);
        self.join(driver_id, new_stop_id);
        Ok(current)
    }

    fn handle(&mut self, key: ConnectionKey, msg: ClientMessage) {
        self.received.push(msg.clone());
        let Some(driver_id) = self.connections.get(&key).map(|c| c.driver_id) else {
            return;
        };

        match msg {
            ClientMessage::Subscribe { stop_id } => {
                if let Some(conn) = self.connections.get_mut(&key) {
                    conn.subscriptions.insert(stop_id);
                }
                return;
            }
            ClientMessage::Unsubscribe { stop_id } => {
                if let Some(conn) = self.connections.get_mut(&key) {
                    conn.subscriptions.remove(&stop_id);
                }
                return;
            }
            _ => {}
        }

        if self.hold_replies {
            debug!(kind = msg.kind(), "fake queue server holding reply");
            return;
        }

        match msg {
            ClientMessage::GetRoster {
                request_id,
                stop_id,
            } => {
                let queue = self.snapshot(stop_id);
                self.send_to(key, &ServerMessage::Roster { request_id, queue });
            }
            ClientMessage::MyPosition { request_id } => {
                let position = self.position_of(driver_id);
                self.send_to(
                    key,
                    &ServerMessage::Position {
                        request_id,
                        position,
                    },
                );
            }
            ClientMessage::Enter {
                request_id,
                stop_id,
            } => {
                let result = match self.reject_next_action.take() {
                    Some(message) => Err(message),
                    None => self.enter(driver_id, stop_id),
                };
                let joined = result.is_ok();
                self.action_reply(key, request_id, result);
                if joined {
                    self.broadcast_roster(stop_id);
                }
            }
            ClientMessage::Exit { request_id, .. } => {
                let result = match self.reject_next_action.take() {
                    Some(message) => Err(message),
                    None => self
                        .leave(driver_id)
                        .ok_or_else(|| "driver is not in any queue".to_string()),
                };
                match result {
                    Ok(left) => {
                        self.action_reply(key, request_id, Ok(()));
                        self.broadcast_roster(left);
                    }
                    Err(message) => self.action_reply(key, request_id, Err(message)),
                }
            }
            ClientMessage::ChangeStop {
                request_id,
                new_stop_id,
                ..
            } => {
                let result = match self.reject_next_action.take() {
                    Some(message) => Err(message),
                    None => self.change(driver_id, new_stop_id),
                };
                match result {
                    Ok(previous) => {
                        self.action_reply(key, request_id, Ok(()));
                        self.broadcast_roster(previous);
                        self.broadcast_roster(new_stop_id);
                    }
                    Err(message) => self.action_reply(key, request_id, Err(message)),
                }
            }
            ClientMessage::Subscribe { .. } | ClientMessage::Unsubscribe { .. } => {}
        }
    }
}

/// In-memory queue server for tests and demos.
///
/// Cloning yields another handle to the same server.
#[derive(Clone, Default)]
pub struct FakeQueueServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeQueueServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state
            .lock()
            .expect("FakeQueueServer: state lock poisoned")
    }

    // === Setup ===

    pub fn add_stop(&self, stop: Stop) {
        self.state().stops.insert(stop.id, stop);
    }

    /// Accepts `token` as the credential of `driver`.
    pub fn register_driver(&self, token: impl Into<String>, driver: Driver, vehicle: Vehicle) {
        self.state()
            .drivers
            .insert(token.into(), Registered { driver, vehicle });
    }

    /// Places a registered driver at the back of a stop's queue.
    pub fn seed(&self, stop_id: StopId, driver_id: DriverId) {
        let mut state = self.state();
        state.leave(driver_id);
        state.join(driver_id, stop_id);
    }

    /// Refuse (or accept again) new connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Stop answering requests (or resume).
    pub fn hold_replies(&self, hold: bool) {
        self.state().hold_replies = hold;
    }

    /// Fail the next enter/exit/change_stop with `message`.
    pub fn reject_next_action(&self, message: impl Into<String>) {
        self.state().reject_next_action = Some(message.into());
    }

    // === Server-side actions ===

    /// Drops every live connection, as a network loss would.
    pub fn drop_connections(&self) {
        let dropped = std::mem::take(&mut self.state().connections);
        debug!(count = dropped.len(), "fake queue server dropped connections");
    }

    /// Removes a driver from whatever queue they are in and pushes the change.
    pub fn remove_driver(&self, driver_id: DriverId) {
        let mut state = self.state();
        if let Some(stop_id) = state.leave(driver_id) {
            state.broadcast_roster(stop_id);
        }
    }

    /// Pushes an unsolicited error to every connection.
    pub fn push_error(&self, message: impl Into<String>) {
        let state = self.state();
        let msg = ServerMessage::Error {
            message: message.into(),
        };
        for key in state.connections.keys() {
            state.send_to(*key, &msg);
        }
    }

    /// Pushes an arbitrary roster snapshot to every connection, subscribed
    /// to its stop or not.
    pub fn push_roster(&self, queue: StopQueue) {
        let state = self.state();
        let msg = ServerMessage::RosterUpdated { queue };
        for key in state.connections.keys() {
            state.send_to(*key, &msg);
        }
    }

    // === Inspection ===

    pub fn roster(&self, stop_id: StopId) -> StopQueue {
        self.state().snapshot(stop_id)
    }

    pub fn position_of(&self, driver_id: DriverId) -> MyPosition {
        self.state().position_of(driver_id)
    }

    /// Every client frame received so far, in order.
    pub fn received(&self) -> Vec<ClientMessage> {
        self.state().received.clone()
    }

    /// Number of received frames of a kind (`"subscribe"`, `"enter"`, ...).
    pub fn count_received(&self, kind: &str) -> usize {
        self.state()
            .received
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }

    pub fn clear_received(&self) {
        self.state().received.clear();
    }

    pub fn connection_count(&self) -> usize {
        self.state().connections.len()
    }

    /// Whether any connection is subscribed to `stop_id`.
    pub fn has_subscriber(&self, stop_id: StopId) -> bool {
        self.state()
            .connections
            .values()
            .any(|c| c.subscriptions.contains(&stop_id))
    }

    fn open(&self, token: &str) -> Result<(ConnectionKey, mpsc::UnboundedReceiver<String>), TransportError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(TransportError::Refused("fake queue server offline".to_string()));
        }
        let driver_id = state
            .drivers
            .get(token)
            .map(|r| r.driver.id)
            .ok_or(TransportError::Unauthorized)?;
        state.next_connection += 1;
        let key = state.next_connection;
        let (outbox, inbox) = mpsc::unbounded_channel();
        state.connections.insert(
            key,
            Connection {
                driver_id,
                subscriptions: HashSet::new(),
                outbox,
            },
        );
        Ok((key, inbox))
    }

    fn receive(&self, key: ConnectionKey, frame: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.connections.contains_key(&key) {
            return Err(TransportError::Closed);
        }
        match serde_json::from_str::<ClientMessage>(frame) {
            Ok(msg) => state.handle(key, msg),
            Err(e) => {
                let msg = ServerMessage::Error {
                    message: format!("bad frame: {}", e),
                };
                state.send_to(key, &msg);
            }
        }
        Ok(())
    }

    fn close(&self, key: ConnectionKey) {
        self.state().connections.remove(&key);
    }
}

/// Connector that opens transports into a [`FakeQueueServer`].
#[derive(Clone)]
pub struct InMemoryConnector {
    server: FakeQueueServer,
}

impl InMemoryConnector {
    pub fn new(server: FakeQueueServer) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, token: &SecretString) -> Result<Box<dyn Transport>, TransportError> {
        let (key, inbox) = self.server.open(token.expose_secret())?;
        Ok(Box::new(InMemoryTransport {
            key,
            server: self.server.clone(),
            inbox,
        }))
    }
}

struct InMemoryTransport {
    key: ConnectionKey,
    server: FakeQueueServer,
    inbox: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.server.receive(self.key, &frame)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbox.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.server.close(self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::queue::StopStatus;

    fn stop_id(id: i64) -> StopId {
        StopId::new(id).unwrap()
    }

    fn driver(id: i64) -> (Driver, Vehicle) {
        (
            Driver {
                id: DriverId::new(id),
                first_name: format!("Driver{}", id),
                last_name: "Test".to_string(),
                phone: String::new(),
            },
            Vehicle {
                license_plate: format!("ABC-{}", id),
                brand: "Toyota".to_string(),
                model: "Hiace".to_string(),
                color: "white".to_string(),
                internal_number: None,
            },
        )
    }

    fn server() -> FakeQueueServer {
        let server = FakeQueueServer::new();
        server.add_stop(Stop::new(stop_id(5), "Toquepala"));
        server.add_stop(Stop::new(stop_id(7), "Cuajone"));
        server.add_stop(Stop::new(stop_id(9), "Closed").with_status(StopStatus::Maintenance));
        for id in 1..=3 {
            let (d, v) = driver(id);
            server.register_driver(format!("token-{}", id), d, v);
        }
        server
    }

    async fn connect(server: &FakeQueueServer, token: &str) -> Box<dyn Transport> {
        InMemoryConnector::new(server.clone())
            .connect(&SecretString::new(token.to_string()))
            .await
            .unwrap()
    }

    async fn next(transport: &mut Box<dyn Transport>) -> ServerMessage {
        let frame = transport.recv().await.unwrap().unwrap();
        serde_json::from_str(&frame).unwrap()
    }

    fn frame(msg: ClientMessage) -> String {
        serde_json::to_string(&msg).unwrap()
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let server = server();
        let result = InMemoryConnector::new(server)
            .connect(&SecretString::new("nope".to_string()))
            .await;
        assert!(matches!(result, Err(TransportError::Unauthorized)));
    }

    #[tokio::test]
    async fn enter_replies_then_pushes_to_subscribers() {
        let server = server();
        server.seed(stop_id(5), DriverId::new(1));
        server.seed(stop_id(5), DriverId::new(2));
        let mut t = connect(&server, "token-3").await;

        t.send(frame(ClientMessage::Subscribe { stop_id: stop_id(5) }))
            .await
            .unwrap();
        t.send(frame(ClientMessage::Enter {
            request_id: RequestId::new(1),
            stop_id: stop_id(5),
        }))
        .await
        .unwrap();

        assert_eq!(
            next(&mut t).await,
            ServerMessage::ActionResult {
                request_id: RequestId::new(1),
                success: true,
                message: None
            }
        );
        match next(&mut t).await {
            ServerMessage::RosterUpdated { queue } => {
                assert_eq!(queue.total_vehicles, 3);
                assert!(queue.validate().is_ok());
                assert_eq!(queue.vehicles[2].driver.id, DriverId::new(3));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(server.position_of(DriverId::new(3)).position, Some(3));
    }

    #[tokio::test]
    async fn enter_twice_is_rejected() {
        let server = server();
        server.seed(stop_id(7), DriverId::new(1));
        let mut t = connect(&server, "token-1").await;

        t.send(frame(ClientMessage::Enter {
            request_id: RequestId::new(1),
            stop_id: stop_id(5),
        }))
        .await
        .unwrap();

        match next(&mut t).await {
            ServerMessage::ActionResult { success, message, .. } => {
                assert!(!success);
                assert_eq!(message.as_deref(), Some("driver is already in a queue"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn inactive_stop_refuses_entry() {
        let server = server();
        let mut t = connect(&server, "token-1").await;
        t.send(frame(ClientMessage::Enter {
            request_id: RequestId::new(1),
            stop_id: stop_id(9),
        }))
        .await
        .unwrap();

        assert!(matches!(
            next(&mut t).await,
            ServerMessage::ActionResult { success: false, .. }
        ));
    }

    #[tokio::test]
    async fn change_stop_moves_driver_and_renumbers() {
        let server = server();
        server.seed(stop_id(5), DriverId::new(1));
        server.seed(stop_id(5), DriverId::new(2));
        let mut t = connect(&server, "token-1").await;

        t.send(frame(ClientMessage::ChangeStop {
            request_id: RequestId::new(4),
            new_stop_id: stop_id(7),
            observations: None,
        }))
        .await
        .unwrap();

        assert!(matches!(
            next(&mut t).await,
            ServerMessage::ActionResult { success: true, .. }
        ));
        let toquepala = server.roster(stop_id(5));
        assert_eq!(toquepala.total_vehicles, 1);
        assert_eq!(toquepala.vehicles[0].position, 1);
        assert!(server.position_of(DriverId::new(1)).is_at(stop_id(7)));
    }

    #[tokio::test]
    async fn held_replies_are_never_sent() {
        let server = server();
        server.hold_replies(true);
        let mut t = connect(&server, "token-1").await;
        t.send(frame(ClientMessage::MyPosition {
            request_id: RequestId::new(1),
        }))
        .await
        .unwrap();

        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), t.recv()).await;
        assert!(waited.is_err());
        assert_eq!(server.count_received("my_position"), 1);
    }

    #[tokio::test]
    async fn dropped_connection_ends_the_stream() {
        let server = server();
        let mut t = connect(&server, "token-1").await;
        server.drop_connections();

        assert!(t.recv().await.is_none());
        assert!(matches!(
            t.send(frame(ClientMessage::Subscribe { stop_id: stop_id(5) })).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn refused_connections_report_refused() {
        let server = server();
        server.refuse_connections(true);
        let result = InMemoryConnector::new(server)
            .connect(&SecretString::new("token-1".to_string()))
            .await;
        assert!(matches!(result, Err(TransportError::Refused(_))));
    }
}
