//! In-memory adapters.
//!
//! - `token_store` - Session token holder
//! - `fake_server` - In-process queue server and connector (tests, demos)

mod fake_server;
mod token_store;

pub use fake_server::{FakeQueueServer, InMemoryConnector};
pub use token_store::InMemoryTokenStore;
