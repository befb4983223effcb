//! Credential access
//!
//! The bearer token is issued and refreshed elsewhere. The engine only
//! reads it before each connection attempt and drops it when the server
//! refuses it.

use parking_lot::RwLock;
use tracing::info;

/// Synchronous access to the bearer credential.
pub trait CredentialStore: Send + Sync {
    /// Current token, if any
    fn token(&self) -> Option<String>;

    /// Forget the token after the server rejected it
    fn invalidate(&self);

    /// Token, ignoring blank values
    fn usable_token(&self) -> Option<String> {
        self.token().filter(|t| !t.trim().is_empty())
    }
}

/// In-memory credential holder.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    /// Store holding `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Store with no token
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the token (after a fresh login)
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn invalidate(&self) {
        if self.token.write().take().is_some() {
            info!("Credential invalidated");
        }
    }
}
