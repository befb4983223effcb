//! Endpoint building per connection scope
//!
//! - Admin: `{base}{admin_path}?token=...`
//! - Conversation: `{base}/ws/{participant_id}?token=...`

use reqwest::Url;

use crate::error::ConnectionError;
use crate::protocol::ConnectionScope;

/// Default admin socket path
pub const DEFAULT_ADMIN_PATH: &str = "/ws/admin-dashboard";

/// Socket server location plus the per-scope path rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    admin_path: String,
}

impl Endpoint {
    /// Parse a base URL. `http`/`https` are mapped to `ws`/`wss`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidEndpoint`] for unparsable URLs or
    /// unsupported schemes.
    pub fn parse(base_url: &str) -> Result<Self, ConnectionError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ConnectionError::InvalidEndpoint(format!("{base_url}: {e}")))?;

        let scheme = match base.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(ConnectionError::InvalidEndpoint(format!(
                    "unsupported scheme `{other}`"
                )))
            }
        };
        if base.scheme() != scheme && base.set_scheme(scheme).is_err() {
            return Err(ConnectionError::InvalidEndpoint(format!(
                "cannot switch {base_url} to {scheme}"
            )));
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base,
            admin_path: DEFAULT_ADMIN_PATH.to_string(),
        })
    }

    /// Override the admin socket path
    #[must_use]
    pub fn with_admin_path(mut self, path: impl Into<String>) -> Self {
        self.admin_path = path.into();
        self
    }

    /// Base URL
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Handshake URL for `scope`, authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Fails when the participant id is empty.
    pub fn url_for(&self, scope: &ConnectionScope, token: &str) -> Result<Url, ConnectionError> {
        let mut url = self.base.clone();

        match scope {
            ConnectionScope::Admin => {
                let prefix = self.base.path().trim_end_matches('/');
                let path = format!("{prefix}/{}", self.admin_path.trim_start_matches('/'));
                url.set_path(&path);
            }
            ConnectionScope::Conversation(key) => {
                if key.participant_id.is_empty() {
                    return Err(ConnectionError::InvalidEndpoint(
                        "participant id is empty".to_string(),
                    ));
                }
                url.path_segments_mut()
                    .map_err(|()| {
                        ConnectionError::InvalidEndpoint("base URL cannot carry a path".to_string())
                    })?
                    .pop_if_empty()
                    .push("ws")
                    .push(&key.participant_id);
            }
        }

        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

/// URL with the `token` parameter masked, for logs and errors.
#[must_use]
pub fn redact(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConversationKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_admin_url() {
        let endpoint = Endpoint::parse("ws://127.0.0.1:8000").unwrap();
        let url = endpoint.url_for(&ConnectionScope::Admin, "abc").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws/admin-dashboard?token=abc");
    }

    #[test]
    fn test_http_scheme_is_mapped() {
        let endpoint = Endpoint::parse("https://chat.example.com/api/").unwrap();
        assert_eq!(endpoint.base().scheme(), "wss");

        let url = endpoint.url_for(&ConnectionScope::Admin, "t").unwrap();
        assert_eq!(url.as_str(), "wss://chat.example.com/api/ws/admin-dashboard?token=t");
    }

    #[test]
    fn test_conversation_url_encodes_participant() {
        let endpoint = Endpoint::parse("ws://localhost:8000").unwrap();
        let scope = ConnectionScope::Conversation(ConversationKey::new("a b/c", "webchat"));
        let url = endpoint.url_for(&scope, "x+y=").unwrap();
        assert_eq!(url.path(), "/ws/a%20b%2Fc");
        assert_eq!(url.query(), Some("token=x%2By%3D"));
    }

    #[test]
    fn test_custom_admin_path() {
        let endpoint = Endpoint::parse("ws://localhost").unwrap().with_admin_path("staff/live");
        let url = endpoint.url_for(&ConnectionScope::Admin, "t").unwrap();
        assert_eq!(url.path(), "/staff/live");
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        assert!(Endpoint::parse("ftp://example.com").is_err());
        assert!(Endpoint::parse("not a url").is_err());

        let endpoint = Endpoint::parse("ws://localhost").unwrap();
        let scope = ConnectionScope::Conversation(ConversationKey::new("", "webchat"));
        assert!(endpoint.url_for(&scope, "t").is_err());
    }

    #[test]
    fn test_redact_masks_token() {
        let endpoint = Endpoint::parse("ws://localhost").unwrap();
        let url = endpoint.url_for(&ConnectionScope::Admin, "secret").unwrap();
        let shown = redact(&url);
        assert!(shown.contains("token=***"));
        assert!(!shown.contains("secret"));
    }
}
