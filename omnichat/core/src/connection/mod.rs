//! Connection management
//!
//! - [`ConnectionManager`]: one logical socket session, its heartbeat and
//!   its reconnect policy
//! - [`ListenerRegistry`] / [`Subscription`]: event fan-out
//! - [`ReconnectPolicy`]: exponential backoff with a bounded attempt count

pub mod backoff;
pub mod listeners;
pub mod manager;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use listeners::{ListenerId, ListenerRegistry, Subscription};
pub use manager::{ConnectionConfig, ConnectionManager, NORMAL_CLOSE};
pub use state::{ConnectionState, SessionEvent};
