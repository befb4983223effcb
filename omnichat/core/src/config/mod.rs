//! Client configuration
//!
//! Loads client settings from `~/.config/omnichat/client.toml`.
//!
//! # Precedence
//!
//! Highest first:
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. `OMNICHAT_*` environment variables
//! 3. `client.toml`
//! 4. Default values
//!
//! # Example
//!
//! ```toml
//! [connection]
//! base_url = "wss://chat.example.com"
//! admin_path = "/ws/admin-dashboard"
//! connect_timeout_ms = 5000
//! reconnect_base_delay_ms = 1000
//! reconnect_max_delay_ms = 30000
//! reconnect_max_attempts = 5
//! idle_timeout_secs = 90
//!
//! [typing]
//! indicator_timeout_ms = 3000
//! emit_throttle_ms = 2000
//! emit_idle_ms = 2000
//!
//! [http]
//! base_url = "https://chat.example.com"
//! send_path = "/admin/api/send"
//! followup_viewed_path = "/admin/api/followups/{id}/viewed"
//! request_timeout_ms = 10000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::ConnectionConfig;
use crate::error::ConnectionError;
use crate::side_channel::HttpConfig;
use crate::transport::endpoint::DEFAULT_ADMIN_PATH;
use crate::transport::Endpoint;
use crate::typing::TypingConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `client.toml` exists but could not be read
    #[error("Cannot read {path}: {source}")]
    ReadError {
        /// File that was read
        path: PathBuf,
        /// I/O failure
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Malformed client.toml: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Values that cannot drive a session
    #[error("Rejected configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Highest-precedence layer that set a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command line
    Cli,
    /// `OMNICHAT_*` variables
    Env,
    /// `client.toml`
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Connection section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionToml {
    /// Socket server base URL (`ws://`, `wss://`, `http://` or `https://`)
    pub base_url: Option<String>,

    /// Path of the admin broadcast socket
    pub admin_path: Option<String>,

    /// Handshake deadline in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// First reconnect delay in milliseconds
    pub reconnect_base_delay_ms: Option<u64>,

    /// Reconnect delay cap in milliseconds
    pub reconnect_max_delay_ms: Option<u64>,

    /// Reconnect attempts before going dormant (0 = never reconnect)
    pub reconnect_max_attempts: Option<u32>,

    /// Silence before a session counts as dropped (0 = disabled)
    pub idle_timeout_secs: Option<u64>,
}

/// Typing section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingToml {
    /// Indicator lifetime without a refresh
    pub indicator_timeout_ms: Option<u64>,

    /// Minimum gap between outbound typing frames
    pub emit_throttle_ms: Option<u64>,

    /// Input idle time before the stop frame
    pub emit_idle_ms: Option<u64>,
}

/// HTTP side-channel section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpToml {
    /// API base URL
    pub base_url: Option<String>,

    /// Send endpoint path
    pub send_path: Option<String>,

    /// Mark-viewed endpoint path, `{id}` is substituted
    pub followup_viewed_path: Option<String>,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Connection configuration section
    pub connection: ConnectionToml,

    /// Typing configuration section
    pub typing: TypingToml,

    /// HTTP configuration section
    pub http: HttpToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
///
/// Use [`load_config`] to load it with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Socket server base URL
    pub base_url: String,

    /// Admin socket path
    pub admin_path: String,

    /// Session timing and reconnect schedule
    pub connection: ConnectionConfig,

    /// Typing timing
    pub typing: TypingConfig,

    /// Side-channel settings
    pub http: HttpConfig,

    /// `client.toml` that was read, when one existed
    pub config_file_path: Option<PathBuf>,

    /// Highest layer that contributed
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8000".to_string(),
            admin_path: DEFAULT_ADMIN_PATH.to_string(),
            connection: ConnectionConfig::default(),
            typing: TypingConfig::default(),
            http: HttpConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Defaults only
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the effective values came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Override the recorded source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Socket endpoint built from `base_url` and `admin_path`
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidEndpoint`] for an unusable URL.
    pub fn endpoint(&self) -> Result<Endpoint, ConnectionError> {
        Ok(Endpoint::parse(&self.base_url)?.with_admin_path(self.admin_path.clone()))
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reconnect = &self.connection.reconnect;
        if reconnect.max_attempts > 0 && reconnect.base_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "reconnect_base_delay_ms must be positive when reconnects are enabled".into(),
            ));
        }
        if reconnect.max_delay < reconnect.base_delay {
            return Err(ConfigError::ValidationError(format!(
                "reconnect_max_delay_ms ({}) is smaller than reconnect_base_delay_ms ({})",
                reconnect.max_delay.as_millis(),
                reconnect.base_delay.as_millis()
            )));
        }
        if self.typing.indicator_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "indicator_timeout_ms must be positive".into(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("base_url is empty".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Location of `client.toml`
///
/// Returns `$XDG_CONFIG_HOME/omnichat/client.toml` or
/// `~/.config/omnichat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("omnichat").join("client.toml"))
}

/// Defaults, then `client.toml`, then `OMNICHAT_*` variables
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the merged values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Like [`load_config`] but reading `path` instead of the default location
///
/// # Arguments
///
/// * `path` - file to read; `None` skips the file layer
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the merged values fail validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config_from_path`] with an explicit environment lookup
fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();

    if let Some(config_path) = &path {
        if config_path.exists() {
            let text =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&text)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn idle_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Copy the values present in `toml` over `config`
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    let conn = &toml.connection;
    if let Some(ref url) = conn.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(ref path) = conn.admin_path {
        config.admin_path.clone_from(path);
    }
    if let Some(ms) = conn.connect_timeout_ms {
        config.connection.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = conn.reconnect_base_delay_ms {
        config.connection.reconnect.base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = conn.reconnect_max_delay_ms {
        config.connection.reconnect.max_delay = Duration::from_millis(ms);
    }
    if let Some(attempts) = conn.reconnect_max_attempts {
        config.connection.reconnect.max_attempts = attempts;
    }
    if let Some(secs) = conn.idle_timeout_secs {
        config.connection.idle_timeout = idle_timeout(secs);
    }

    let typing = &toml.typing;
    if let Some(ms) = typing.indicator_timeout_ms {
        config.typing.indicator_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = typing.emit_throttle_ms {
        config.typing.emit_throttle = Duration::from_millis(ms);
    }
    if let Some(ms) = typing.emit_idle_ms {
        config.typing.emit_idle = Duration::from_millis(ms);
    }

    let http = &toml.http;
    if let Some(ref url) = http.base_url {
        config.http.base_url.clone_from(url);
    }
    if let Some(ref path) = http.send_path {
        config.http.send_path.clone_from(path);
    }
    if let Some(ref path) = http.followup_viewed_path {
        config.http.followup_viewed_path.clone_from(path);
    }
    if let Some(ms) = http.request_timeout_ms {
        config.http.request_timeout = Duration::from_millis(ms);
    }
}

/// Copy `OMNICHAT_*` values over `config`
fn apply_env_config<F>(config: &mut ClientConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let millis = |name: &str| env(name).and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(url) = env("OMNICHAT_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = env("OMNICHAT_ADMIN_PATH") {
        config.admin_path = path;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("OMNICHAT_API_URL") {
        config.http.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("OMNICHAT_CONNECT_TIMEOUT_MS") {
        config.connection.connect_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("OMNICHAT_RECONNECT_BASE_DELAY_MS") {
        config.connection.reconnect.base_delay = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("OMNICHAT_RECONNECT_MAX_DELAY_MS") {
        config.connection.reconnect.max_delay = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(attempts) = env("OMNICHAT_RECONNECT_ATTEMPTS").and_then(|v| v.trim().parse().ok()) {
        config.connection.reconnect.max_attempts = attempts;
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = millis("OMNICHAT_IDLE_TIMEOUT_SECS") {
        config.connection.idle_timeout = idle_timeout(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = millis("OMNICHAT_TYPING_TIMEOUT_MS") {
        config.typing.indicator_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line values, applied last
///
/// Build one from parsed arguments and call [`ConfigOverrides::apply`].
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Socket base URL override
    pub base_url: Option<String>,

    /// API base URL override
    pub api_url: Option<String>,

    /// Handshake deadline in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Reconnect attempt bound override
    pub reconnect_max_attempts: Option<u32>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set API base URL override
    #[must_use]
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = Some(url);
        self
    }

    /// Handshake deadline
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set reconnect attempt bound override
    #[must_use]
    pub fn with_reconnect_max_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_max_attempts = Some(attempts);
        self
    }

    /// Write the set fields into `config`
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.base_url.is_some()
            || self.api_url.is_some()
            || self.connect_timeout_ms.is_some()
            || self.reconnect_max_attempts.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(ref url) = self.api_url {
            config.http.base_url.clone_from(url);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connection.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.reconnect_max_attempts {
            config.connection.reconnect.max_attempts = attempts;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
