//! Side-channel HTTP calls
//!
//! Sending staff text and marking follow-ups viewed go over plain HTTP,
//! not over the socket. The engine only cares whether a call succeeded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AuthError, SideEffectError};
use crate::model::FollowupId;
use crate::transport::CredentialStore;

/// Body of a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    /// Visitor id
    pub user_id: String,
    /// Channel
    pub channel: String,
    /// Trimmed message text
    pub text: String,
}

/// Calls the engine makes outside the socket.
#[async_trait]
pub trait SideChannel: Send + Sync {
    /// Ask the server to deliver staff text
    async fn send_message(&self, request: &SendRequest) -> Result<(), SideEffectError>;

    /// Mark a follow-up viewed (idempotent server-side)
    async fn mark_followup_viewed(&self, id: FollowupId) -> Result<(), SideEffectError>;
}

/// Side-channel endpoints and timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// API base URL
    pub base_url: String,
    /// Path of the send endpoint
    pub send_path: String,
    /// Path of the mark-viewed endpoint; `{id}` is replaced by the id
    pub followup_viewed_path: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            send_path: "/admin/api/send".to_string(),
            followup_viewed_path: "/admin/api/followups/{id}/viewed".to_string(),
            request_timeout: Duration::from_millis(10_000),
        }
    }
}

/// [`SideChannel`] over reqwest with bearer authentication.
pub struct HttpSideChannel {
    client: reqwest::Client,
    base: Url,
    send_path: String,
    viewed_path: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpSideChannel {
    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable base URL or if the HTTP client cannot be built.
    pub fn new(
        config: &HttpConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, SideEffectError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            SideEffectError::Request(format!("invalid API base URL {}: {e}", config.base_url))
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SideEffectError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base,
            send_path: config.send_path.clone(),
            viewed_path: config.followup_viewed_path.clone(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> Result<Url, SideEffectError> {
        self.base
            .join(path)
            .map_err(|e| SideEffectError::Request(format!("invalid path {path}: {e}")))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(), SideEffectError> {
        let request = match self.credentials.usable_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| SideEffectError::Request(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "Side-channel call rejected, credential invalidated");
            self.credentials.invalidate();
            return Err(AuthError::Forbidden {
                status: status.as_u16(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(SideEffectError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SideChannel for HttpSideChannel {
    async fn send_message(&self, request: &SendRequest) -> Result<(), SideEffectError> {
        let url = self.url(&self.send_path)?;
        debug!(user_id = %request.user_id, channel = %request.channel, "POST send");
        self.execute(self.client.post(url).json(request)).await
    }

    async fn mark_followup_viewed(&self, id: FollowupId) -> Result<(), SideEffectError> {
        let path = self.viewed_path.replace("{id}", &id.to_string());
        let url = self.url(&path)?;
        debug!(followup = %id, "POST mark viewed");
        self.execute(self.client.post(url)).await
    }
}

impl std::fmt::Debug for HttpSideChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSideChannel")
            .field("base", &self.base.as_str())
            .field("send_path", &self.send_path)
            .field("viewed_path", &self.viewed_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryCredentialStore;

    fn channel(config: &HttpConfig) -> HttpSideChannel {
        HttpSideChannel::new(config, Arc::new(MemoryCredentialStore::new("t"))).unwrap()
    }

    #[test]
    fn test_paths_resolve_against_base() {
        let ch = channel(&HttpConfig::default());
        assert_eq!(
            ch.url(&ch.send_path).unwrap().as_str(),
            "http://127.0.0.1:8000/admin/api/send"
        );
        let viewed = ch.viewed_path.replace("{id}", &FollowupId(42).to_string());
        assert_eq!(
            ch.url(&viewed).unwrap().as_str(),
            "http://127.0.0.1:8000/admin/api/followups/42/viewed"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = HttpConfig {
            base_url: "::nope".to_string(),
            ..Default::default()
        };
        assert!(HttpSideChannel::new(&config, Arc::new(MemoryCredentialStore::empty())).is_err());
    }

    #[test]
    fn test_send_request_body() {
        let body = serde_json::to_value(SendRequest {
            user_id: "u1".into(),
            channel: "sms".into(),
            text: "hello".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"user_id": "u1", "channel": "sms", "text": "hello"}));
    }
}
