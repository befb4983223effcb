//! omnichat-watch - Headless live dashboard
//!
//! Opens one live session (the admin feed, or a single conversation) and
//! prints the reconciled conversation list every time it changes.
//!
//! # Usage
//!
//! ```bash
//! # Admin feed with the token from the environment
//! OMNICHAT_TOKEN=... omnichat-watch --base-url wss://chat.example.com
//!
//! # One conversation, sending a reply once connected
//! omnichat-watch --participant +15550100 --channel sms --send "On my way"
//!
//! # Verbose logging
//! RUST_LOG=debug omnichat-watch
//! ```
//!
//! # Exit codes
//!
//! - `0`: interrupted with Ctrl-C
//! - `1`: startup failure
//! - `2`: credential missing or rejected
//! - `3`: reconnect attempts exhausted

mod monitor;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use omnichat_core::transport::WebSocketConnector;
use omnichat_core::{
    load_config, load_config_from_path, ClientConfig, ConfigOverrides, ConnectionManager,
    ConnectionScope, ConversationKey, Dashboard, DashboardChange, HttpSideChannel,
    MemoryCredentialStore, SessionEvent,
};

use monitor::Monitor;

const EXIT_AUTH: u8 = 2;
const EXIT_DORMANT: u8 = 3;

/// omnichat-watch - follow live conversations from a terminal
#[derive(Parser, Debug)]
#[command(name = "omnichat-watch")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Socket server base URL (ws://, wss://, http:// or https://)
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// API base URL for sends
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Bearer token
    #[arg(short = 't', long, env = "OMNICHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Watch one participant's conversation instead of the admin feed
    #[arg(short = 'p', long, value_name = "ID")]
    participant: Option<String>,

    /// Channel of the watched conversation
    #[arg(long, default_value = "webchat")]
    channel: String,

    /// Configuration file path
    #[arg(short = 'c', long, env = "OMNICHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "OMNICHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Send TEXT to the watched conversation once connected
    #[arg(long, value_name = "TEXT", requires = "participant")]
    send: Option<String>,
}

impl Args {
    fn scope(&self) -> ConnectionScope {
        match &self.participant {
            Some(participant) => ConnectionScope::Conversation(ConversationKey::new(
                participant.clone(),
                self.channel.clone(),
            )),
            None => ConnectionScope::Admin,
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            api_url: self.api_url.clone(),
            ..ConfigOverrides::default()
        }
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("omnichat_watch={level},omnichat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone()))
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => load_config().context("Failed to load configuration")?,
    };
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(source = %config.source(), base_url = %config.base_url, "Configuration resolved");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("omnichat-watch starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&args)?;
    let credentials = Arc::new(match &args.token {
        Some(token) => MemoryCredentialStore::new(token.clone()),
        None => MemoryCredentialStore::empty(),
    });

    let side_channel = Arc::new(
        HttpSideChannel::new(&config.http, credentials.clone())
            .context("Failed to build HTTP client")?,
    );
    let manager = ConnectionManager::new(
        config.endpoint().context("Invalid socket URL")?,
        args.scope(),
        Arc::new(WebSocketConnector::new()),
        credentials,
    )
    .with_config(config.connection.clone());

    let dashboard = Dashboard::new(side_channel, &config.typing);
    let _attached = dashboard.attach(&manager);

    let (lifecycle_tx, mut lifecycle) = mpsc::unbounded_channel();
    let _lifecycle = manager.add_listener(move |event| {
        if !matches!(event, SessionEvent::Inbound(_)) {
            let _ = lifecycle_tx.send(event.clone());
        }
    });

    if let Err(e) = manager.connect() {
        if e.is_terminal_auth() {
            error!("No token available, pass --token or set OMNICHAT_TOKEN");
            return Ok(ExitCode::from(EXIT_AUTH));
        }
        return Err(e).context("Failed to start session");
    }

    let mut monitor = Monitor::new(std::io::stdout());
    let mut changes = dashboard.changes();
    let mut pending_send = args.send.clone();
    let target = args.scope().conversation_key().cloned();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let code = loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Interrupted, disconnecting");
                manager.disconnect().await;
                break ExitCode::SUCCESS;
            }
            Some(event) = lifecycle.recv() => {
                monitor::log_event(&event);
                match event {
                    SessionEvent::Connected => {
                        if let (Some(text), Some(key)) = (pending_send.take(), target.as_ref()) {
                            match dashboard
                                .dispatcher()
                                .send_text(&key.participant_id, &key.channel, &text)
                                .await
                            {
                                Ok(()) => info!(conversation = %key, "Message sent"),
                                Err(e) => error!(conversation = %key, error = %e, "Send failed"),
                            }
                        }
                    }
                    SessionEvent::AuthRequired { .. } => break ExitCode::from(EXIT_AUTH),
                    SessionEvent::Dormant { .. } => break ExitCode::from(EXIT_DORMANT),
                    _ => {}
                }
            }
            change = changes.recv() => {
                let printed = match change {
                    Ok(DashboardChange::Conversations) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        monitor.conversations(&dashboard.conversations(), &dashboard.typing().typing_keys())
                    }
                    Ok(DashboardChange::Transcript(key)) => match dashboard.transcript(&key).last() {
                        Some(message) => monitor.message(&key, message),
                        None => Ok(()),
                    },
                    Ok(DashboardChange::Followups) => Ok(()),
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Dashboard change feed closed");
                        manager.disconnect().await;
                        break ExitCode::FAILURE;
                    }
                };
                if let Err(e) = printed {
                    warn!(error = %e, "Failed to write to stdout");
                }
            }
        }
    };

    info!("omnichat-watch stopped");
    Ok(code)
}
