//! Connection Manager
//!
//! Owns one logical socket session. A spawned task runs the session loop:
//!
//! ```text
//!  connect() ──► [token?] ──no──► AuthRequired (nothing spawned)
//!                   │yes
//!                   ▼
//!        ┌──► handshake (connect_timeout) ──refused 401/403──► AuthRequired
//!        │          │ok
//!        │          ▼
//!        │     Open: frames ─► decode ─► listeners
//!        │           ping ─► pong (internal)
//!        │          │closed / idle / error
//!        │          ▼
//!        │     close 1008/1003? ──yes──► invalidate credential, AuthRequired
//!        │          │no
//!        │          ▼
//!        └── backoff sleep ◄── attempt <= max ──no──► Dormant
//! ```
//!
//! `disconnect()` signals the task, which closes the transport and cancels
//! any pending reconnect before it exits.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, ConnectionError, SyncError};
use crate::protocol::{ConnectionScope, EventDecoder, InboundEvent, OutboundFrame};
use crate::transport::{redact, Connector, CredentialStore, Endpoint, Frame, FrameStream};

use super::backoff::ReconnectPolicy;
use super::listeners::{ListenerRegistry, Subscription};
use super::state::{ConnectionState, SessionEvent};

/// Close code reported for an explicit `disconnect()`
pub const NORMAL_CLOSE: u16 = 1000;

/// Session timing and retry settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Handshake deadline (default: 5 seconds)
    pub connect_timeout: Duration,
    /// Silence after which the session counts as dropped (default: 90
    /// seconds). `None` disables idle detection.
    pub idle_timeout: Option<Duration>,
    /// Reconnect schedule
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(90)),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// Set the handshake deadline
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set or disable idle detection
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reconnect schedule
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

struct Shared {
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Connection state changed");
        }
    }
}

struct SessionTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// One reconnecting socket session with subscribers.
///
/// Must be used inside a tokio runtime: `connect()` spawns the session task.
pub struct ConnectionManager {
    endpoint: Endpoint,
    scope: ConnectionScope,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialStore>,
    config: ConnectionConfig,
    listeners: ListenerRegistry,
    shared: Arc<Shared>,
    task: Mutex<Option<SessionTask>>,
}

impl ConnectionManager {
    /// Manager for `scope` at `endpoint` with default timing.
    pub fn new(
        endpoint: Endpoint,
        scope: ConnectionScope,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            endpoint,
            scope,
            connector,
            credentials,
            config: ConnectionConfig::default(),
            listeners: ListenerRegistry::new(),
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Idle),
                attempts: AtomicU32::new(0),
                outbound: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    /// Replace the timing and retry settings
    #[must_use]
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Scope the socket is opened for
    #[must_use]
    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Display label for the current state
    #[must_use]
    pub fn status_label(&self) -> String {
        self.state().status_label()
    }

    /// True while the session is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts since the session was last open
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Registry the manager dispatches to
    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Subscribe to session events.
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    fn is_active(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start the session if none is active.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] without attempting to
    /// connect when no usable token is available.
    pub fn connect(&self) -> Result<(), SyncError> {
        if self.is_active() {
            debug!("connect() ignored, session already active");
            return Ok(());
        }

        if self.credentials.usable_token().is_none() {
            warn!("No credential available, not connecting");
            self.shared.set_state(ConnectionState::AuthRequired);
            self.listeners
                .dispatch(&SessionEvent::AuthRequired { code: None });
            return Err(AuthError::MissingCredential.into());
        }

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }

        self.shared.attempts.store(0, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Connecting);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = SessionRunner {
            endpoint: self.endpoint.clone(),
            scope: self.scope.clone(),
            connector: Arc::clone(&self.connector),
            credentials: Arc::clone(&self.credentials),
            config: self.config.clone(),
            listeners: self.listeners.clone(),
            shared: Arc::clone(&self.shared),
        };
        let handle = tokio::spawn(runner.run(shutdown_rx));
        *task = Some(SessionTask {
            shutdown: shutdown_tx,
            handle,
        });

        info!(scope = %scope_label(&self.scope), "Session starting");
        Ok(())
    }

    /// Tear the session down and cancel any pending reconnect. Returns once
    /// the session task has exited.
    ///
    /// Do not await this from inside a listener callback.
    pub async fn disconnect(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Session task ended abnormally");
            }
        }

        *self.shared.outbound.lock() = None;
        self.shared.attempts.store(0, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Idle);
        info!("Session disconnected");
    }

    /// Write `frame` if the session is open. Returns false (and logs a
    /// warning) otherwise.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        if !self.is_open() {
            warn!(frame = frame.kind(), state = ?self.state(), "Socket not open, frame dropped");
            return false;
        }

        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(frame = frame.kind(), error = %e, "Failed to encode frame");
                return false;
            }
        };

        let sent = self
            .shared
            .outbound
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(text).is_ok());
        if !sent {
            warn!(frame = frame.kind(), "Session closing, frame dropped");
        }
        sent
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("scope", &self.scope)
            .field("state", &self.state())
            .field("attempts", &self.reconnect_attempts())
            .finish_non_exhaustive()
    }
}

fn scope_label(scope: &ConnectionScope) -> String {
    match scope {
        ConnectionScope::Admin => "admin".to_string(),
        ConnectionScope::Conversation(key) => key.to_string(),
    }
}

// ============================================================================
// Session task
// ============================================================================

enum Outcome {
    Shutdown,
    Dropped,
    AuthRejected { code: Option<u16> },
}

enum Opened {
    Stream(Box<dyn FrameStream>),
    Failed(Outcome),
}

struct SessionRunner {
    endpoint: Endpoint,
    scope: ConnectionScope,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialStore>,
    config: ConnectionConfig,
    listeners: ListenerRegistry,
    shared: Arc<Shared>,
}

impl SessionRunner {
    fn emit(&self, event: SessionEvent) {
        self.listeners.dispatch(&event);
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let Some(token) = self.credentials.usable_token() else {
                warn!("Credential disappeared, not reconnecting");
                self.shared.set_state(ConnectionState::AuthRequired);
                self.emit(SessionEvent::AuthRequired { code: None });
                return;
            };

            let url = match self.endpoint.url_for(&self.scope, &token) {
                Ok(url) => url,
                Err(e) => {
                    error!(error = %e, "Cannot build socket URL, session dormant");
                    self.shared.set_state(ConnectionState::Dormant);
                    self.emit(SessionEvent::Dormant { attempts: 0 });
                    return;
                }
            };

            let outcome = match self.open(&url, &mut shutdown).await {
                Opened::Stream(stream) => self.drive(stream, &mut shutdown).await,
                Opened::Failed(outcome) => outcome,
            };

            match outcome {
                Outcome::Shutdown => return,
                Outcome::AuthRejected { code } => {
                    self.reject_credential(code);
                    return;
                }
                Outcome::Dropped => {
                    if !self.wait_for_reconnect(&mut shutdown).await {
                        return;
                    }
                }
            }
        }
    }

    async fn open(&self, url: &Url, shutdown: &mut watch::Receiver<bool>) -> Opened {
        let attempt = tokio::time::timeout(self.config.connect_timeout, self.connector.connect(url));

        tokio::select! {
            biased;
            _ = shutdown.changed() => Opened::Failed(Outcome::Shutdown),
            result = attempt => match result {
                Ok(Ok(stream)) => Opened::Stream(stream),
                Ok(Err(SyncError::Auth(e))) => {
                    warn!(url = %redact(url), error = %e, "Handshake refused");
                    let code = match e {
                        AuthError::Forbidden { status } => Some(status),
                        AuthError::Rejected { code } => Some(code),
                        AuthError::MissingCredential => None,
                    };
                    Opened::Failed(Outcome::AuthRejected { code })
                }
                Ok(Err(e)) => {
                    warn!(url = %redact(url), error = %e, "Connection attempt failed");
                    Opened::Failed(Outcome::Dropped)
                }
                Err(_) => {
                    let e = ConnectionError::Timeout(self.config.connect_timeout);
                    warn!(url = %redact(url), error = %e, "Connection attempt failed");
                    Opened::Failed(Outcome::Dropped)
                }
            },
        }
    }

    async fn drive(
        &self,
        mut stream: Box<dyn FrameStream>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Outcome {
        let (tx, mut outbound) = mpsc::unbounded_channel::<String>();
        *self.shared.outbound.lock() = Some(tx);
        self.shared.attempts.store(0, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Open);
        info!(scope = %scope_label(&self.scope), "Session open");
        self.emit(SessionEvent::Connected);

        let decoder = EventDecoder::new(self.scope.clone());
        let mut last_inbound = Instant::now();

        let (outcome, code, reason) = loop {
            let idle_deadline = self.config.idle_timeout.map(|d| last_inbound + d);

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    break (Outcome::Shutdown, Some(NORMAL_CLOSE), "client disconnect".to_string());
                }
                frame = stream.next_frame() => match frame {
                    None => break (Outcome::Dropped, None, "stream ended".to_string()),
                    Some(Err(e)) => break (Outcome::Dropped, None, e.to_string()),
                    Some(Ok(Frame::Close(Some(info)))) if info.is_auth_failure() => {
                        break (Outcome::AuthRejected { code: Some(info.code) }, Some(info.code), info.reason);
                    }
                    Some(Ok(Frame::Close(Some(info)))) => break (Outcome::Dropped, Some(info.code), info.reason),
                    Some(Ok(Frame::Close(None))) => break (Outcome::Dropped, None, "closed by server".to_string()),
                    Some(Ok(Frame::Control)) => last_inbound = Instant::now(),
                    Some(Ok(Frame::Text(text))) => {
                        last_inbound = Instant::now();
                        if let Err(e) = self.handle_text(&decoder, stream.as_mut(), &text).await {
                            break (Outcome::Dropped, None, e.to_string());
                        }
                    }
                },
                Some(text) = outbound.recv() => {
                    if let Err(e) = stream.send_text(text).await {
                        break (Outcome::Dropped, None, e.to_string());
                    }
                }
                () = idle_expiry(idle_deadline) => {
                    warn!(idle_timeout = ?self.config.idle_timeout, "No frames within idle timeout, treating session as dropped");
                    break (Outcome::Dropped, None, "idle timeout".to_string());
                }
            }
        };

        *self.shared.outbound.lock() = None;
        stream.close().await;
        drop(stream);

        info!(?code, %reason, "Session closed");
        self.emit(SessionEvent::Disconnected { code, reason });
        outcome
    }

    async fn handle_text(
        &self,
        decoder: &EventDecoder,
        stream: &mut dyn FrameStream,
        text: &str,
    ) -> Result<(), ConnectionError> {
        match decoder.decode(text) {
            Ok(InboundEvent::Heartbeat) => {
                debug!("Heartbeat ping, answering pong");
                let pong = OutboundFrame::Pong
                    .to_json()
                    .map_err(|e| ConnectionError::SendFailed(e.to_string()))?;
                stream.send_text(pong).await
            }
            Ok(event) => {
                debug!(event = event.kind(), "Inbound event");
                self.emit(SessionEvent::Inbound(event));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                Ok(())
            }
        }
    }

    /// Sleep out the backoff delay. False when the session should end.
    async fn wait_for_reconnect(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let attempt = self.shared.attempts.load(Ordering::SeqCst) + 1;

        let Some(delay) = self.config.reconnect.delay_for(attempt) else {
            let attempts = attempt - 1;
            error!(attempts, "Reconnect attempts exhausted, session dormant");
            self.shared.set_state(ConnectionState::Dormant);
            self.emit(SessionEvent::Dormant { attempts });
            return false;
        };

        self.shared.attempts.store(attempt, Ordering::SeqCst);
        self.shared
            .set_state(ConnectionState::Reconnecting { attempt });
        info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        self.emit(SessionEvent::Reconnecting { attempt, delay });

        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!(attempt, "Pending reconnect cancelled");
                false
            }
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn reject_credential(&self, code: Option<u16>) {
        warn!(?code, "Server rejected the credential, not reconnecting");
        self.credentials.invalidate();
        self.shared.set_state(ConnectionState::AuthRequired);
        self.emit(SessionEvent::AuthRequired { code });
    }
}

async fn idle_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
