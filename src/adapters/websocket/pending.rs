//! Pending request table for reply correlation.
//!
//! Each outstanding request owns a oneshot sender keyed by its request id.
//! A reply resolves exactly one entry. Dropping an entry (timeout, lost
//! connection, teardown) resolves its receiver with `RecvError`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{oneshot, Mutex};

use super::messages::{RequestId, ServerReply};

pub(crate) struct PendingRequests {
    next_id: AtomicU64,
    waiting: Mutex<HashMap<RequestId, oneshot::Sender<ServerReply>>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiting: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates a fresh id and registers a waiter for it.
    pub(crate) async fn register(&self) -> (RequestId, oneshot::Receiver<ServerReply>) {
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().await.insert(id, tx);
        (id, rx)
    }

    /// Delivers a reply. Returns false if nobody is waiting for `id`.
    pub(crate) async fn resolve(&self, id: RequestId, reply: ServerReply) -> bool {
        let waiter = self.waiting.lock().await.remove(&id);
        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Forgets a single waiter (timeout or failed send).
    pub(crate) async fn cancel(&self, id: RequestId) {
        self.waiting.lock().await.remove(&id);
    }

    /// Drops every waiter; their receivers observe the connection loss.
    pub(crate) async fn fail_all(&self) -> usize {
        let mut waiting = self.waiting.lock().await;
        let count = waiting.len();
        waiting.clear();
        count
    }

    pub(crate) async fn len(&self) -> usize {
        self.waiting.lock().await.len()
    }
}
