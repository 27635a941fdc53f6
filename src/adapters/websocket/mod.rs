//! WebSocket adapters for the live queue channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Application (QueueSession)                        │
//! │   subscribe / fetch_roster / enter / exit / change_stop / position  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                │ QueueChannel                  ▲ ChannelEvent
//!                ▼                               │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     ConnectionManager                                │
//! │   - PendingRequests: requestId → oneshot                            │
//! │   - supervisor task: pump frames, detect loss, back off, reconnect  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                │ Connector / Transport
//!                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   WebSocketConnector (tokio-tungstenite) │ InMemoryConnector (test) │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire protocol types
//! - [`connection`] - Connection manager and supervisor
//! - [`tungstenite`] - Production websocket transport

pub mod connection;
pub mod messages;
mod pending;
pub mod tungstenite;

pub use connection::{ConnectionManager, ConnectionSettings};
pub use messages::{ClientMessage, Incoming, RequestId, ServerMessage, ServerReply};
pub use tungstenite::{WebSocketConnector, WebSocketTransport};
