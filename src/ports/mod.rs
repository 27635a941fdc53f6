//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application layer and the outside world. Adapters implement these
//! ports.
//!
//! ## Channel Ports
//!
//! - `QueueChannel` - Live channel to the queue server (requests and pushes)
//! - `Transport` / `Connector` - Raw authenticated text-frame transport
//!
//! ## Collaborator Ports
//!
//! - `TokenStore` - Current session credential
//! - `StopCatalog` - Read-only stop listing from the administration API

mod queue_channel;
mod stop_catalog;
mod token_store;
mod transport;

pub use queue_channel::{
    ChannelError, ChannelEvent, ConnectionId, ConnectionStatus, QueueChannel,
};
pub use stop_catalog::{CatalogError, StopCatalog};
pub use token_store::TokenStore;
pub use transport::{Connector, Transport, TransportError};
