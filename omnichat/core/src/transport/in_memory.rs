//! In-Memory Transport
//!
//! Channel-backed sessions for embedding the engine next to a server in the
//! same process, and for driving the connection manager in tests.
//!
//! # Usage
//!
//! ```ignore
//! let (connector, mut server) = InMemoryConnector::pair();
//!
//! // Hand `connector` to the ConnectionManager, then:
//! let mut conn = server.accept().await.unwrap();
//! conn.send_text(r#"{"type":"ping"}"#);
//! assert_eq!(conn.recv().await.as_deref(), Some(r#"{"type":"pong"}"#));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::mpsc;

use crate::error::{AuthError, ConnectionError, SyncError};

use super::endpoint::redact;
use super::traits::{CloseInfo, Connector, Frame, FrameStream};

/// How the next connection attempt is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectPlan {
    /// Open a session
    Accept,
    /// Fail like an unreachable server
    Refuse,
    /// Fail the handshake with an HTTP auth status
    Reject {
        /// HTTP status (401 / 403)
        status: u16,
    },
    /// Never answer (exercises the connect timeout)
    Stall,
}

struct Shared {
    plans: Mutex<VecDeque<ConnectPlan>>,
    fallback: Mutex<ConnectPlan>,
    attempts: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    accepted: mpsc::UnboundedSender<ServerConnection>,
}

/// Client half: implements [`Connector`].
#[derive(Clone)]
pub struct InMemoryConnector {
    shared: Arc<Shared>,
}

/// Server half: receives one [`ServerConnection`] per accepted attempt.
pub struct InMemoryServer {
    accepted: mpsc::UnboundedReceiver<ServerConnection>,
}

impl InMemoryConnector {
    /// Create a connected connector/server pair. Attempts are accepted
    /// unless a plan says otherwise.
    #[must_use]
    pub fn pair() -> (Self, InMemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(Shared {
                plans: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(ConnectPlan::Accept),
                attempts: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
                accepted: tx,
            }),
        };
        (connector, InMemoryServer { accepted: rx })
    }

    /// Queue the answer for the next unplanned attempt
    pub fn plan(&self, plan: ConnectPlan) {
        self.shared.plans.lock().push_back(plan);
    }

    /// Answer used once the queue is empty
    pub fn set_fallback(&self, plan: ConnectPlan) {
        *self.shared.fallback.lock() = plan;
    }

    /// Number of connection attempts so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// URLs of every attempt, in order
    #[must_use]
    pub fn urls(&self) -> Vec<Url> {
        self.shared.urls.lock().clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameStream>, SyncError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.shared.urls.lock().push(url.clone());

        let plan = self
            .shared
            .plans
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.shared.fallback.lock().clone());

        match plan {
            ConnectPlan::Accept => {
                let (to_client, incoming) = mpsc::unbounded_channel();
                let (outgoing, from_client) = mpsc::unbounded_channel();
                let conn = ServerConnection {
                    url: url.clone(),
                    to_client,
                    from_client,
                };
                if self.shared.accepted.send(conn).is_err() {
                    return Err(ConnectionError::ConnectFailed {
                        url: redact(url),
                        reason: "server half dropped".to_string(),
                    }
                    .into());
                }
                Ok(Box::new(InMemoryStream {
                    incoming,
                    outgoing: Some(outgoing),
                }))
            }
            ConnectPlan::Refuse => Err(ConnectionError::ConnectFailed {
                url: redact(url),
                reason: "connection refused".to_string(),
            }
            .into()),
            ConnectPlan::Reject { status } => Err(AuthError::Forbidden { status }.into()),
            ConnectPlan::Stall => std::future::pending().await,
        }
    }
}

impl InMemoryServer {
    /// Wait for the next accepted session
    pub async fn accept(&mut self) -> Option<ServerConnection> {
        self.accepted.recv().await
    }

    /// Accepted session, if one is waiting
    pub fn try_accept(&mut self) -> Option<ServerConnection> {
        self.accepted.try_recv().ok()
    }
}

/// Server side of one in-memory session. Dropping it ends the session
/// without a close frame.
pub struct ServerConnection {
    url: Url,
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerConnection {
    /// Handshake URL the client used
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Push a text frame to the client
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(Frame::Text(text.into())).is_ok()
    }

    /// Push a JSON frame to the client
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Push a keepalive control frame
    pub fn send_control(&self) -> bool {
        self.to_client.send(Frame::Control).is_ok()
    }

    /// Close the session with a code
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.to_client
            .send(Frame::Close(Some(CloseInfo::new(code, reason))))
            .is_ok()
    }

    /// Next frame written by the client; `None` once the client closed
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Frame written by the client, if one is waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// True once the client released its end
    #[must_use]
    pub fn is_client_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}

struct InMemoryStream {
    incoming: mpsc::UnboundedReceiver<Frame>,
    outgoing: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameStream for InMemoryStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        match &self.outgoing {
            Some(tx) => tx
                .send(text)
                .map_err(|_| ConnectionError::SendFailed("peer closed".to_string())),
            None => Err(ConnectionError::SendFailed("session closed".to_string())),
        }
    }

    async fn close(&mut self) {
        self.outgoing = None;
        self.incoming.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("ws://mem/ws/admin-dashboard?token=t").unwrap()
    }

    #[tokio::test]
    async fn test_accept_round_trip() {
        let (connector, mut server) = InMemoryConnector::pair();
        let mut client = connector.connect(&url()).await.unwrap();
        let mut conn = server.accept().await.unwrap();

        assert!(conn.send_text("hello"));
        assert_eq!(client.next_frame().await.unwrap().unwrap(), Frame::Text("hello".into()));

        client.send_text("world".into()).await.unwrap();
        assert_eq!(conn.recv().await.as_deref(), Some("world"));

        client.close().await;
        assert!(conn.is_client_closed());
        assert_eq!(conn.recv().await, None);
    }

    #[tokio::test]
    async fn test_plans_are_consumed_in_order() {
        let (connector, _server) = InMemoryConnector::pair();
        connector.plan(ConnectPlan::Refuse);
        connector.plan(ConnectPlan::Reject { status: 401 });

        assert!(matches!(
            connector.connect(&url()).await.err(),
            Some(SyncError::Connection(_))
        ));
        assert!(matches!(
            connector.connect(&url()).await.err(),
            Some(SyncError::Auth(AuthError::Forbidden { status: 401 }))
        ));
        assert!(connector.connect(&url()).await.is_ok());
        assert_eq!(connector.attempts(), 3);
        assert_eq!(connector.urls().len(), 3);
    }

    #[tokio::test]
    async fn test_server_drop_ends_stream() {
        let (connector, mut server) = InMemoryConnector::pair();
        let mut client = connector.connect(&url()).await.unwrap();
        drop(server.accept().await);
        assert!(client.next_frame().await.is_none());
    }
}
