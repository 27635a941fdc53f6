//! Scriptable `QueueChannel` double shared by the application tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch, Notify};

use crate::domain::foundation::StopId;
use crate::domain::queue::{ActionOutcome, ExitReason, MyPosition, Stop, StopQueue};
use crate::ports::{ChannelError, ConnectionId, ConnectionStatus, QueueChannel};

/// One observed call on the channel.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Subscribe(StopId),
    Unsubscribe(StopId),
    FetchRoster(StopId),
    Enter(StopId),
    Exit(ExitReason, Option<String>),
    ChangeStop(StopId, Option<String>),
    MyPosition,
}

pub(crate) struct MockQueueChannel {
    status: watch::Sender<ConnectionStatus>,
    calls: Mutex<Vec<Call>>,
    rosters: Mutex<HashMap<StopId, StopQueue>>,
    position: Mutex<MyPosition>,
    scripted_positions: Mutex<VecDeque<oneshot::Receiver<MyPosition>>>,
    outcomes: Mutex<VecDeque<Result<ActionOutcome, ChannelError>>>,
    action_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockQueueChannel {
    pub(crate) fn connected() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::connected(ConnectionId::new()));
        Self {
            status,
            calls: Mutex::new(Vec::new()),
            rosters: Mutex::new(HashMap::new()),
            position: Mutex::new(MyPosition::not_in_queue()),
            scripted_positions: Mutex::new(VecDeque::new()),
            outcomes: Mutex::new(VecDeque::new()),
            action_gate: Mutex::new(None),
        }
    }

    pub(crate) fn disconnected() -> Self {
        let mock = Self::connected();
        mock.set_connected(false);
        mock
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        let status = if connected {
            ConnectionStatus::connected(ConnectionId::new())
        } else {
            ConnectionStatus::disconnected(Some("network down".to_string()))
        };
        self.status.send_replace(status);
    }

    pub(crate) fn with_roster(self, queue: StopQueue) -> Self {
        self.rosters.lock().unwrap().insert(queue.stop_id, queue);
        self
    }

    pub(crate) fn set_position(&self, position: MyPosition) {
        *self.position.lock().unwrap() = position;
    }

    /// The next `my_position` call waits for the returned sender.
    pub(crate) fn script_position(&self) -> oneshot::Sender<MyPosition> {
        let (tx, rx) = oneshot::channel();
        self.scripted_positions.lock().unwrap().push_back(rx);
        tx
    }

    pub(crate) fn push_outcome(&self, outcome: Result<ActionOutcome, ChannelError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Actions block until the returned gate is notified.
    pub(crate) fn gate_actions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.action_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) -> Result<(), ChannelError> {
        if !self.status.borrow().is_connected {
            return Err(ChannelError::NotConnected);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    async fn action(&self) -> Result<ActionOutcome, ChannelError> {
        let gate = self.action_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self.outcomes.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(ActionOutcome::succeeded()))
    }
}

#[async_trait]
impl QueueChannel for MockQueueChannel {
    fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    async fn subscribe(&self, stop_id: StopId) -> Result<(), ChannelError> {
        self.record(Call::Subscribe(stop_id))
    }

    async fn unsubscribe(&self, stop_id: StopId) -> Result<(), ChannelError> {
        self.record(Call::Unsubscribe(stop_id))
    }

    async fn fetch_roster(&self, stop_id: StopId) -> Result<StopQueue, ChannelError> {
        self.record(Call::FetchRoster(stop_id))?;
        let roster = self.rosters.lock().unwrap().get(&stop_id).cloned();
        Ok(roster.unwrap_or_else(|| StopQueue::empty(stop_id)))
    }

    async fn enter(&self, stop_id: StopId) -> Result<ActionOutcome, ChannelError> {
        self.record(Call::Enter(stop_id))?;
        self.action().await
    }

    async fn exit(
        &self,
        reason: ExitReason,
        observations: Option<String>,
    ) -> Result<ActionOutcome, ChannelError> {
        self.record(Call::Exit(reason, observations))?;
        self.action().await
    }

    async fn change_stop(
        &self,
        new_stop_id: StopId,
        observations: Option<String>,
    ) -> Result<ActionOutcome, ChannelError> {
        self.record(Call::ChangeStop(new_stop_id, observations))?;
        self.action().await
    }

    async fn my_position(&self) -> Result<MyPosition, ChannelError> {
        self.record(Call::MyPosition)?;
        let scripted = self.scripted_positions.lock().unwrap().pop_front();
        match scripted {
            Some(rx) => rx.await.map_err(|_| ChannelError::ConnectionLost),
            None => Ok(self.position.lock().unwrap().clone()),
        }
    }
}

pub(crate) fn stop_id(id: i64) -> StopId {
    StopId::new(id).unwrap()
}

pub(crate) fn stop(id: i64, name: &str) -> Stop {
    Stop::new(stop_id(id), name)
}
