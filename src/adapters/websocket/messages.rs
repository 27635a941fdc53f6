//! WebSocket message types for the queue channel.
//!
//! Defines the protocol between client and queue server:
//! - Client → Server: subscription control, correlated requests
//! - Server → Client: correlated replies, roster pushes, errors
//!
//! Every frame is a JSON object tagged by `"type"`. Requests carry a
//! `requestId`; the matching reply echoes it back.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StopId;
use crate::domain::queue::{ActionOutcome, ExitReason, MyPosition, StopQueue};

/// Correlates a request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving `roster_updated` pushes for a stop.
    #[serde(rename_all = "camelCase")]
    Subscribe { stop_id: StopId },

    /// Stop receiving pushes for a stop.
    #[serde(rename_all = "camelCase")]
    Unsubscribe { stop_id: StopId },

    /// One-shot roster fetch.
    #[serde(rename_all = "camelCase")]
    GetRoster {
        request_id: RequestId,
        stop_id: StopId,
    },

    /// Join the queue at a stop.
    #[serde(rename_all = "camelCase")]
    Enter {
        request_id: RequestId,
        stop_id: StopId,
    },

    /// Leave the current queue.
    #[serde(rename_all = "camelCase")]
    Exit {
        request_id: RequestId,
        reason: ExitReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observations: Option<String>,
    },

    /// Leave the current queue and join another in one transaction.
    #[serde(rename_all = "camelCase")]
    ChangeStop {
        request_id: RequestId,
        new_stop_id: StopId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observations: Option<String>,
    },

    /// Fetch the caller's own position.
    #[serde(rename_all = "camelCase")]
    MyPosition { request_id: RequestId },
}

impl ClientMessage {
    /// Request id, for request variants.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            ClientMessage::Subscribe { .. } | ClientMessage::Unsubscribe { .. } => None,
            ClientMessage::GetRoster { request_id, .. }
            | ClientMessage::Enter { request_id, .. }
            | ClientMessage::Exit { request_id, .. }
            | ClientMessage::ChangeStop { request_id, .. }
            | ClientMessage::MyPosition { request_id } => Some(*request_id),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Unsubscribe { .. } => "unsubscribe",
            ClientMessage::GetRoster { .. } => "get_roster",
            ClientMessage::Enter { .. } => "enter",
            ClientMessage::Exit { .. } => "exit",
            ClientMessage::ChangeStop { .. } => "change_stop",
            ClientMessage::MyPosition { .. } => "my_position",
        }
    }
}

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `get_roster`.
    #[serde(rename_all = "camelCase")]
    Roster {
        request_id: RequestId,
        queue: StopQueue,
    },

    /// Reply to `enter`, `exit` and `change_stop`.
    #[serde(rename_all = "camelCase")]
    ActionResult {
        request_id: RequestId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Reply to `my_position`.
    #[serde(rename_all = "camelCase")]
    Position {
        request_id: RequestId,
        position: MyPosition,
    },

    /// Unsolicited full roster for a subscribed stop.
    RosterUpdated { queue: StopQueue },

    /// Unsolicited error, not tied to any request.
    Error { message: String },
}

/// Payload of a correlated reply, once separated from its request id.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerReply {
    Roster(StopQueue),
    Action(ActionOutcome),
    Position(MyPosition),
}

/// Server frame classified as a reply or a push.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Reply(RequestId, ServerReply),
    RosterUpdated(StopQueue),
    Error(String),
}

impl From<ServerMessage> for Incoming {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Roster { request_id, queue } => {
                Incoming::Reply(request_id, ServerReply::Roster(queue))
            }
            ServerMessage::ActionResult {
                request_id,
                success,
                message,
            } => Incoming::Reply(request_id, ServerReply::Action(ActionOutcome { success, message })),
            ServerMessage::Position {
                request_id,
                position,
            } => Incoming::Reply(request_id, ServerReply::Position(position)),
            ServerMessage::RosterUpdated { queue } => Incoming::RosterUpdated(queue),
            ServerMessage::Error { message } => Incoming::Error(message),
        }
    }
}
