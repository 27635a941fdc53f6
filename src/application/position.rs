//! PositionResolver - Single source of truth for "where am I".
//!
//! Pull-only: the value changes only when `refresh` is called, which happens
//! once per successful connect and once after every membership action. There
//! is no timer.
//!
//! Each reply replaces the whole `MyPosition`. Replies are tagged with the
//! sequence number of the refresh that issued them and applied only when
//! newer than the held revision, so a slow reply can never overwrite a newer
//! one. A newer refresh that fails does not hold back an older reply that
//! succeeded. `invalidate` raises the revision floor so nothing issued before
//! it lands afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::domain::queue::MyPosition;
use crate::ports::{ChannelError, QueueChannel};

/// Resolved personal position plus whether it has been resolved at all.
///
/// `loaded == false` means "unknown" and must not be read as "not in a queue".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionState {
    pub loaded: bool,
    pub position: MyPosition,
    /// Newest sequence number applied or invalidated.
    pub revision: u64,
}

pub struct PositionResolver {
    channel: Arc<dyn QueueChannel>,
    state: watch::Sender<PositionState>,
    issued: AtomicU64,
}

impl PositionResolver {
    pub fn new(channel: Arc<dyn QueueChannel>) -> Self {
        let (state, _) = watch::channel(PositionState::default());
        Self {
            channel,
            state,
            issued: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> PositionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PositionState> {
        self.state.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    /// Fetches the position and replaces the held value with it.
    ///
    /// Returns the fetched value even when a newer reply or an invalidation
    /// already superseded it and it was therefore not applied.
    ///
    /// # Errors
    ///
    /// Propagates channel failures; the held value is left untouched.
    pub async fn refresh(&self) -> Result<MyPosition, ChannelError> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let position = self.channel.my_position().await.map_err(|e| {
            debug!(seq, error = %e, "position refresh failed");
            e
        })?;

        let applied = self.state.send_if_modified(|state| {
            if seq <= state.revision {
                return false;
            }
            *state = PositionState {
                loaded: true,
                position: position.clone(),
                revision: seq,
            };
            true
        });

        if applied {
            debug!(
                seq,
                in_queue = position.in_queue,
                stop_id = ?position.stop_id(),
                rank = ?position.position,
                "position resolved"
            );
        } else {
            debug!(seq, "superseded position reply discarded");
        }
        Ok(position)
    }

    /// Marks the position unknown (e.g. after the channel dropped) and
    /// discards any reply still in flight.
    pub fn invalidate(&self) {
        let floor = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_if_modified(|state| {
            let was_loaded = state.loaded;
            state.loaded = false;
            state.revision = state.revision.max(floor);
            was_loaded
        });
    }
}
