//! Configuration for the sync engine
//!
//! TOML file plus a small set of environment overrides, with sensible
//! defaults for every knob so a bare `refsync-server` starts locally.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Edge server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket edge
    pub bind_address: SocketAddr,

    /// Directory for all durable state (profiles, membership, sessions)
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1:8400".parse().expect("static default addr"),
            data_dir: PathBuf::from("./refsync-data"),
        }
    }
}

/// Sync-engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Signature freshness window; the sole anti-replay mechanism
    #[serde(with = "humantime_serde")]
    pub signature_freshness: Duration,

    /// Idle window after which a socketless session actor parks
    #[serde(with = "humantime_serde")]
    pub session_idle_timeout: Duration,

    /// Actor mailbox depth
    pub mailbox_capacity: usize,

    /// Per-socket outbound buffer; a backlogged socket counts as dead
    pub socket_capacity: usize,

    /// Lifetime of issued integration tokens
    #[serde(with = "humantime_serde")]
    pub integration_token_ttl: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            signature_freshness: Duration::from_secs(60),
            session_idle_timeout: Duration::from_secs(600),
            mailbox_capacity: 64,
            socket_capacity: 64,
            integration_token_ttl: Duration::from_secs(3600),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Emit JSON-formatted log lines
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&data)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for file-less startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = env::var("REFSYNC_BIND") {
            self.server.bind_address = addr
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("bad REFSYNC_BIND: {}", addr)))?;
        }
        if let Ok(dir) = env::var("REFSYNC_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = env::var("REFSYNC_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.signature_freshness.is_zero() {
            return Err(ConfigError::Invalid(
                "signature_freshness must be non-zero".to_string(),
            ));
        }
        if self.sync.mailbox_capacity == 0 || self.sync.socket_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel capacities must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
