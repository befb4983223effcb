//! Omnichat Core - Real-time conversation synchronization engine
//!
//! This crate owns the live side of every omnichat surface: the admin
//! dashboard, the embeddable web widget and the mobile app all drive the
//! same engine instead of each carrying their own socket and merge logic.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Host Surfaces                             │
//! │   ┌───────────┐    ┌────────────┐    ┌────────────────────────┐  │
//! │   │ Dashboard │    │   Widget   │    │ Mobile / omnichat-watch│  │
//! │   └─────┬─────┘    └─────┬──────┘    └───────────┬────────────┘  │
//! │         └────────────────┴───────────────────────┘               │
//! │                          │  SessionEvent (listeners)             │
//! └──────────────────────────┼───────────────────────────────────────┘
//!                            │
//! ┌──────────────────────────┼───────────────────────────────────────┐
//! │                    OMNICHAT CORE                                  │
//! │  ┌───────────────────────┴───────────────────────────────────┐   │
//! │  │ ConnectionManager ── Connector ── FrameStream (ws / mem)  │   │
//! │  │        │ EventDecoder                                      │   │
//! │  └────────┼──────────────────────────────────────────────────┘   │
//! │     ┌─────┴──────┬──────────────┬──────────────┐                 │
//! │  ┌──┴────────┐ ┌─┴──────────┐ ┌─┴──────────┐ ┌─┴─────────────┐   │
//! │  │Reconciler │ │ Transcript │ │  Typing    │ │ FollowupBoard │   │
//! │  └───────────┘ └────────────┘ └────────────┘ └───────────────┘   │
//! │                                                                   │
//! │  OutboundDispatcher ─┐                ┌─ ViewedOnceGuard         │
//! │                      └── SideChannel ─┘   (HTTP, reqwest)        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ConnectionManager`]: one reconnecting socket session with listeners
//! - [`EventDecoder`]: classifies inbound frames into [`InboundEvent`]s
//! - [`ConversationReconciler`]: newest-touched-first conversation set
//! - [`TypingService`]: typing indicators with timer-driven expiry
//! - [`ViewedOnceGuard`]: exactly-once "follow-up viewed" side effect
//! - [`OutboundDispatcher`]: validated text sends over the side channel
//! - [`Dashboard`]: all of the above wired behind one listener
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use omnichat_core::{
//!     load_config, ConnectionManager, ConnectionScope, Dashboard, HttpSideChannel,
//!     MemoryCredentialStore, transport::WebSocketConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), omnichat_core::SyncError> {
//!     let config = load_config()?;
//!     let credentials = Arc::new(MemoryCredentialStore::new("bearer-token"));
//!     let side_channel = Arc::new(HttpSideChannel::new(&config.http, credentials.clone())?);
//!
//!     let manager = ConnectionManager::new(
//!         config.endpoint()?,
//!         ConnectionScope::Admin,
//!         Arc::new(WebSocketConnector::new()),
//!         credentials,
//!     )
//!     .with_config(config.connection.clone());
//!
//!     let dashboard = Dashboard::new(side_channel, &config.typing);
//!     let _subscription = dashboard.attach(&manager);
//!     manager.connect()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod config;
pub mod connection;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod followups;
pub mod model;
pub mod protocol;
pub mod reconciler;
pub mod side_channel;
pub mod transcript;
pub mod transport;
pub mod typing;
pub mod viewed;

// Re-exports for convenience
pub use alerts::{Alert, AlertPolicy, HostVisibility};
pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, ListenerRegistry, ReconnectPolicy,
    SessionEvent, Subscription,
};
pub use dashboard::{Dashboard, DashboardChange};
pub use dispatch::{Draft, OutboundDispatcher};
pub use error::{
    AuthError, ConnectionError, DecodeError, SideEffectError, SyncError, ValidationError,
};
pub use followups::FollowupBoard;
pub use model::{
    ChatMessage, ConversationKey, ConversationRecord, FollowupId, FollowupRecord, SenderRole,
};
pub use protocol::{ConnectionScope, EventDecoder, InboundEvent, OutboundFrame, TypingSignal};
pub use reconciler::ConversationReconciler;
pub use side_channel::{HttpConfig, HttpSideChannel, SendRequest, SideChannel};
pub use transcript::Transcript;
pub use transport::{
    Connector, CredentialStore, Endpoint, FrameStream, InMemoryConnector, MemoryCredentialStore,
};
pub use typing::{
    TypingConfig, TypingEmitter, TypingPhase, TypingService, TypingTracker, TypingTransition,
};
pub use viewed::{MarkViewedError, ViewedOnceGuard};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
