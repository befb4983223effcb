//! Connection lifecycle state and the events listeners receive

use std::time::Duration;

use crate::protocol::InboundEvent;

/// Lifecycle of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Never connected, or explicitly disconnected
    #[default]
    Idle,
    /// First handshake in flight
    Connecting,
    /// Session open
    Open,
    /// Waiting for, or performing, reconnect `attempt`
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
    },
    /// Reconnect attempts exhausted
    Dormant,
    /// Credential missing or rejected; the host must re-authenticate
    AuthRequired,
}

impl ConnectionState {
    /// Short label for status lines
    #[must_use]
    pub fn status_label(&self) -> String {
        match self {
            Self::Idle => "Disconnected".to_string(),
            Self::Connecting => "Connecting...".to_string(),
            Self::Open => "Connected".to_string(),
            Self::Reconnecting { attempt } => format!("Reconnecting (attempt {attempt})..."),
            Self::Dormant => "Offline".to_string(),
            Self::AuthRequired => "Sign-in required".to_string(),
        }
    }

    /// No further attempts will be made without a new `connect()`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dormant | Self::AuthRequired)
    }
}

/// Everything listeners are told about, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Session opened (first time or after a reconnect)
    Connected,
    /// Session closed
    Disconnected {
        /// Close code, when the peer sent one
        code: Option<u16>,
        /// Reason text
        reason: String,
    },
    /// Reconnect `attempt` scheduled after `delay`
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Time until the attempt
        delay: Duration,
    },
    /// Gave up after `attempts` reconnects
    Dormant {
        /// Attempts made
        attempts: u32,
    },
    /// Credential missing or rejected
    AuthRequired {
        /// Close code or HTTP status that triggered it
        code: Option<u16>,
    },
    /// Decoded frame (heartbeats are never delivered)
    Inbound(InboundEvent),
}

impl SessionEvent {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Dormant { .. } => "dormant",
            Self::AuthRequired { .. } => "auth_required",
            Self::Inbound(event) => event.kind(),
        }
    }
}
