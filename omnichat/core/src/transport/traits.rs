//! Transport Traits
//!
//! A [`Connector`] opens sessions; each session is a [`FrameStream`] that
//! yields text frames and accepts text frames. The connection manager only
//! ever talks to these two traits.

use async_trait::async_trait;
use reqwest::Url;

use crate::error::{ConnectionError, SyncError};

/// Close codes the server uses for authentication or authorization failure.
pub const AUTH_CLOSE_CODES: [u16; 2] = [1008, 1003];

/// Close code and reason sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code
    pub code: u16,
    /// Human readable reason
    pub reason: String,
}

impl CloseInfo {
    /// Build a close description
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Policy violation or unsupported data: the credential was refused
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        AUTH_CLOSE_CODES.contains(&self.code)
    }
}

/// One unit read from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON text frame
    Text(String),
    /// Transport-level keepalive or other non-data frame
    Control,
    /// Peer closed the session
    Close(Option<CloseInfo>),
}

/// An open session.
#[async_trait]
pub trait FrameStream: Send {
    /// Next frame. `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>>;

    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Close the session and release the transport
    async fn close(&mut self);
}

/// Opens sessions to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session.
    ///
    /// Returns [`SyncError::Auth`] when the handshake itself was refused for
    /// credential reasons and [`SyncError::Connection`] for anything else.
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameStream>, SyncError>;
}
