//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `websocket` - Live queue channel (connection manager, tungstenite transport)
//! - `http` - Stop catalog over the REST API
//! - `auth` - Driver identity from the session token
//! - `memory` - Token store, in-process queue server and connector

pub mod auth;
pub mod http;
pub mod memory;
pub mod websocket;

pub use auth::driver_from_token;
pub use http::HttpStopCatalog;
pub use memory::{FakeQueueServer, InMemoryConnector, InMemoryTokenStore};
pub use websocket::{ConnectionManager, ConnectionSettings, WebSocketConnector};
