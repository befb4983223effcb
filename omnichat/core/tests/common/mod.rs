//! Shared harness: a connection manager wired to an in-memory server with
//! every session event captured on a channel.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use omnichat_core::transport::{InMemoryServer, ServerConnection};
use omnichat_core::{
    ConnectionConfig, ConnectionManager, ConnectionScope, Endpoint, InMemoryConnector,
    MemoryCredentialStore, SessionEvent, Subscription,
};

/// Upper bound on any single wait. Generous because tests run on paused
/// time, where it only guards against hangs.
pub const WAIT: Duration = Duration::from_secs(600);

pub struct Harness {
    pub manager: ConnectionManager,
    pub connector: InMemoryConnector,
    pub server: InMemoryServer,
    pub credentials: Arc<MemoryCredentialStore>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    _subscription: Subscription,
}

impl Harness {
    pub fn new(scope: ConnectionScope, config: ConnectionConfig) -> Self {
        let (connector, server) = InMemoryConnector::pair();
        let credentials = Arc::new(MemoryCredentialStore::new("staff-token"));
        let manager = ConnectionManager::new(
            Endpoint::parse("ws://chat.test").unwrap(),
            scope,
            Arc::new(connector.clone()),
            credentials.clone(),
        )
        .with_config(config);

        let (tx, events) = mpsc::unbounded_channel();
        let subscription = manager.add_listener(move |event| {
            let _ = tx.send(event.clone());
        });

        Self {
            manager,
            connector,
            server,
            credentials,
            events,
            _subscription: subscription,
        }
    }

    /// Admin socket with idle detection off
    pub fn admin() -> Self {
        Self::new(ConnectionScope::Admin, quiet_config())
    }

    pub async fn next_event(&mut self) -> SessionEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event channel closed")
    }

    /// Next event that is not `Inbound`
    pub async fn next_lifecycle(&mut self) -> SessionEvent {
        loop {
            let event = self.next_event().await;
            if !matches!(event, SessionEvent::Inbound(_)) {
                return event;
            }
        }
    }

    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.server.accept())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Connect and wait until the session is open
    pub async fn open(&mut self) -> ServerConnection {
        self.manager.connect().unwrap();
        let conn = self.accept().await;
        assert_eq!(self.next_event().await, SessionEvent::Connected);
        conn
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn quiet_config() -> ConnectionConfig {
    ConnectionConfig::default().with_idle_timeout(None)
}

pub fn snapshot(user_id: &str, channel: &str) -> Value {
    json!({
        "type": "snapshot",
        "data": {"user_id": user_id, "channel": channel, "messages": []}
    })
}

pub fn update(user_id: &str, channel: &str, text: &str, ts: &str) -> Value {
    json!({
        "type": "update",
        "data": {
            "user_id": user_id,
            "channel": channel,
            "last_updated": ts,
            "messages": [{"sender": "user", "text": text, "ts": ts}]
        }
    })
}
