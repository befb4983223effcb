//! Transport Layer for omnichat sessions
//!
//! Separates the socket mechanism from the session logic:
//! - `WebSocketConnector`: live server sessions over `ws://` / `wss://`
//! - `InMemoryConnector`: channel-backed sessions for embedding and tests
//!
//! # Security
//!
//! - The bearer credential travels only as the `token` query parameter of
//!   the handshake URL
//! - URLs are redacted before they reach a log line

pub mod auth;
pub mod endpoint;
pub mod in_memory;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use auth::{CredentialStore, MemoryCredentialStore};
pub use endpoint::{redact, Endpoint};
pub use in_memory::{ConnectPlan, InMemoryConnector, InMemoryServer, ServerConnection};
pub use traits::{CloseInfo, Connector, Frame, FrameStream, AUTH_CLOSE_CODES};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
