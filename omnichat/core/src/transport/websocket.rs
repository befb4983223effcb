//! WebSocket connector (tokio-tungstenite)
//!
//! Protocol-level pings are answered by tungstenite itself and surface here
//! only as [`Frame::Control`]. The application heartbeat (`{"type":"ping"}`)
//! is a text frame handled by the connection manager.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{AuthError, ConnectionError, SyncError};

use super::endpoint::redact;
use super::traits::{CloseInfo, Connector, Frame, FrameStream};

/// Opens live WebSocket sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// New connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameStream>, SyncError> {
        debug!(url = %redact(url), "Opening WebSocket");
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => Ok(Box::new(WsSession { inner: stream })),
            Err(WsError::Http(response)) => {
                let status = response.status().as_u16();
                if status == 401 || status == 403 {
                    Err(AuthError::Forbidden { status }.into())
                } else {
                    Err(ConnectionError::ConnectFailed {
                        url: redact(url),
                        reason: format!("handshake answered with HTTP {status}"),
                    }
                    .into())
                }
            }
            Err(e) => Err(ConnectionError::ConnectFailed {
                url: redact(url),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

struct WsSession {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameStream for WsSession {
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>> {
        let message = match self.inner.next().await? {
            Ok(message) => message,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
            Err(e) => return Some(Err(ConnectionError::Dropped(e.to_string()))),
        };

        let frame = match message {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Frame::Text(text),
                Err(_) => Frame::Control,
            },
            Message::Close(close) => Frame::Close(
                close.map(|c| CloseInfo::new(u16::from(c.code), c.reason.into_owned())),
            ),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Control,
        };
        Some(Ok(frame))
    }

    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectionError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}
