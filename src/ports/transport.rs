//! Transport port - Raw text-frame transport under the queue channel.
//!
//! A `Connector` opens one authenticated transport; the `Transport` moves
//! JSON text frames. Framing and correlation live above this seam.

use async_trait::async_trait;
use secrecy::SecretString;

/// Errors raised by a transport or connector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("authentication rejected")]
    Unauthorized,

    #[error("transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),
}

/// One open, authenticated, bidirectional text channel.
///
/// `recv` must be cancel-safe: it is polled inside `tokio::select!`.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Next incoming text frame; `None` once the peer closed the channel.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the transport. Errors are informational only.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports using the session credential.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, token: &SecretString) -> Result<Box<dyn Transport>, TransportError>;
}
