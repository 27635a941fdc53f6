//! WebSocket transport over tokio-tungstenite.
//!
//! The session token travels as a `Bearer` credential on the upgrade request.
//! Only text frames carry protocol messages; ping/pong and binary frames are
//! skipped.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::ports::{Connector, Transport, TransportError};

/// Opens authenticated websocket connections to the queue server.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn map_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::Http(response) if response.status() == StatusCode::UNAUTHORIZED => {
            TransportError::Unauthorized
        }
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        WsError::Io(e) => TransportError::Io(e.to_string()),
        other => TransportError::Refused(other.to_string()),
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, token: &SecretString) -> Result<Box<dyn Transport>, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Refused(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| TransportError::Unauthorized)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        debug!(url = %self.url, "opening queue websocket");
        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(map_ws_error)?;
        debug!(status = %response.status(), "queue websocket upgraded");

        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// One open websocket carrying JSON text frames.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        trace!(bytes = frame.len(), "ws send");
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(map_ws_error)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server closed queue websocket");
                    return None;
                }
                Ok(_) => continue,
                Err(WsError::ConnectionClosed) => return None,
                Err(e) => return Some(Err(map_ws_error(e))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.close(None).await.map_err(map_ws_error)
    }
}
