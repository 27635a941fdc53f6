//! SubscriptionManager - Observes exactly one stop's live roster at a time.
//!
//! Switching stops always unsubscribes the old stop before subscribing the
//! new one, and seeds the new view with a one-shot fetch because pushes only
//! carry changes from now on. Snapshots are full replacements; the last one
//! applied wins. Snapshots that fail validation, or that belong to a stop
//! other than the viewed one, are dropped.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::domain::foundation::StopId;
use crate::domain::queue::StopQueue;
use crate::ports::{ChannelError, QueueChannel};

/// Viewed stop and the latest roster applied for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterState {
    pub viewed: Option<StopId>,
    /// `None` until the first snapshot for `viewed` arrives.
    pub roster: Option<StopQueue>,
}

pub struct SubscriptionManager {
    channel: Arc<dyn QueueChannel>,
    state: watch::Sender<RosterState>,
    // serializes subscribe/unsubscribe sequences on the wire
    op_lock: Mutex<()>,
}

impl SubscriptionManager {
    pub fn new(channel: Arc<dyn QueueChannel>) -> Self {
        let (state, _) = watch::channel(RosterState::default());
        Self {
            channel,
            state,
            op_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> RosterState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RosterState> {
        self.state.subscribe()
    }

    pub fn viewed(&self) -> Option<StopId> {
        self.state.borrow().viewed
    }

    /// Start viewing `stop_id`.
    ///
    /// The viewed stop is recorded even when the channel is down, so the
    /// subscription is re-established on the next connect.
    ///
    /// # Errors
    ///
    /// Channel failures from the subscribe or the seeding fetch.
    pub async fn subscribe(&self, stop_id: StopId) -> Result<(), ChannelError> {
        let _op = self.op_lock.lock().await;

        let previous = self.state.borrow().viewed;
        self.state.send_replace(RosterState {
            viewed: Some(stop_id),
            roster: None,
        });

        if let Some(old) = previous.filter(|old| *old != stop_id) {
            if let Err(e) = self.channel.unsubscribe(old).await {
                debug!(stop_id = %old, error = %e, "unsubscribe skipped");
            }
        }

        self.channel.subscribe(stop_id).await?;
        debug!(%stop_id, "subscribed");
        self.seed(stop_id).await
    }

    /// Stop viewing any stop.
    ///
    /// # Errors
    ///
    /// Channel failure from the unsubscribe. Local state is cleared anyway.
    pub async fn unsubscribe(&self) -> Result<(), ChannelError> {
        let _op = self.op_lock.lock().await;

        let previous = self.state.borrow().viewed;
        self.state.send_replace(RosterState::default());
        match previous {
            Some(old) => {
                debug!(stop_id = %old, "unsubscribed");
                self.channel.unsubscribe(old).await
            }
            None => Ok(()),
        }
    }

    /// Re-establish the subscription after a reconnect.
    ///
    /// Returns the re-subscribed stop, if one was being viewed.
    ///
    /// # Errors
    ///
    /// Channel failures from the subscribe or the seeding fetch.
    pub async fn resubscribe(&self) -> Result<Option<StopId>, ChannelError> {
        let _op = self.op_lock.lock().await;

        let viewed = self.state.borrow().viewed;
        let Some(stop_id) = viewed else {
            return Ok(None);
        };
        self.channel.subscribe(stop_id).await?;
        debug!(%stop_id, "re-subscribed after reconnect");
        self.seed(stop_id).await?;
        Ok(Some(stop_id))
    }

    /// Apply a snapshot (pushed or fetched). Returns whether it was applied.
    pub fn apply(&self, queue: StopQueue) -> bool {
        if let Err(e) = queue.validate() {
            warn!(stop_id = %queue.stop_id, error = %e, "inconsistent roster dropped");
            return false;
        }

        let stop_id = queue.stop_id;
        let applied = self.state.send_if_modified(move |state| {
            if state.viewed != Some(stop_id) {
                return false;
            }
            state.roster = Some(queue);
            true
        });
        if !applied {
            debug!(%stop_id, "roster for a stop not being viewed dropped");
        }
        applied
    }

    async fn seed(&self, stop_id: StopId) -> Result<(), ChannelError> {
        let queue = self.channel.fetch_roster(stop_id).await?;
        self.apply(queue);
        Ok(())
    }
}
