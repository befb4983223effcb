//! Error taxonomy for the synchronization engine
//!
//! Each concern owns a small enum. Transport failures are recovered inside
//! the connection manager; everything else reaches the caller wrapped in
//! [`SyncError`].

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Transport failed to establish or dropped. Recoverable by reconnecting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// Handshake could not be completed
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed {
        /// Endpoint with the credential redacted
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// Handshake did not finish within the connect timeout
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// An established session went away
    #[error("connection dropped: {0}")]
    Dropped(String),

    /// Writing a frame failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Endpoint URL could not be built
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Credential missing or rejected. Terminal: no retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was available when a session was requested
    #[error("authentication required: no credential available")]
    MissingCredential,

    /// Server closed the socket with an auth close code (1008 / 1003)
    #[error("server rejected the credential (close code {code})")]
    Rejected {
        /// WebSocket close code
        code: u16,
    },

    /// Server refused the handshake or a side-channel call over HTTP
    #[error("server refused the request with HTTP {status}")]
    Forbidden {
        /// HTTP status (401 or 403)
        status: u16,
    },
}

/// A frame that could not be classified. Dropped, never fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or JSON that does not fit a record
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON but not an object
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// `type` present but not one we understand
    #[error("unknown frame type `{0}`")]
    UnknownType(String),

    /// Required field absent
    #[error("frame is missing field `{0}`")]
    MissingField(&'static str),

    /// Frame needs a conversation key and none could be derived
    #[error("frame carries no conversation key and the socket is not conversation-scoped")]
    MissingKey,

    /// Object with no recognizable shape
    #[error("unrecognized frame shape")]
    Unrecognized,
}

/// Outbound input rejected before anything was dispatched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Text empty or whitespace only
    #[error("message text is empty")]
    EmptyText,

    /// No participant to address
    #[error("participant id is empty")]
    MissingParticipant,
}

/// A side-channel (HTTP) call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SideEffectError {
    /// The request never produced a response
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status
    #[error("server returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The server rejected the credential
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl SideEffectError {
    /// True when the failure means the credential is no longer valid.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Crate-level error surfaced to callers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Credential failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Malformed frame
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Rejected input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Side-channel failure
    #[error(transparent)]
    SideEffect(#[from] SideEffectError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// True for failures that end the session for good.
    #[must_use]
    pub fn is_terminal_auth(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::SideEffect(e) => e.is_auth(),
            _ => false,
        }
    }
}
