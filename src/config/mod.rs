//! Configuration management for ClipRelay
//!
//! This module handles loading, validating, and managing configuration
//! for the relay and peer modes.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sync::SyncConfig;
use crate::transport::DEFAULT_SLOT;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Relay (server) settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Peer (client) settings
    #[serde(default)]
    pub peer: PeerConfig,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP path accepting WebSocket upgrades
    #[serde(default = "default_path")]
    pub path: String,

    /// Largest accepted request frame in bytes
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,
}

/// Peer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// Relay URL to dial
    #[serde(default = "default_url")]
    pub url: String,

    /// Local clipboard polling interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Slot to synchronize
    #[serde(default = "default_slot")]
    pub slot: String,

    /// Largest request this peer sends; match the relay's `max_payload`
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,

    /// Use this file instead of the system clipboard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard_file: Option<PathBuf>,
}

impl RelayConfig {
    /// Address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("invalid relay address: {}", e)))
    }
}

impl PeerConfig {
    /// Reconciler settings derived from this config
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.slot.clone(), self.interval_ms);
        config.max_payload = self.max_payload;
        config
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_max_payload() -> usize {
    crate::MAX_PAYLOAD_SIZE
}

fn default_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            max_payload: default_max_payload(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            interval_ms: default_interval_ms(),
            slot: default_slot(),
            max_payload: default_max_payload(),
            clipboard_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            relay: RelayConfig::default(),
            peer: PeerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from CLIPRELAY_CONFIG environment variable
    /// 2. ~/.config/cliprelay/config.toml
    /// 3. Falls back to defaults if none exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration with an optional explicit path
    pub fn load_config(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml_str)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cliprelay").join("config.toml"))
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CLIPRELAY_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_path().filter(|p| p.exists())
    }

    /// Expand tilde in paths
    fn expand_paths(&mut self) {
        if let Some(file) = &self.peer.clipboard_file {
            self.peer.clipboard_file = Some(expand_path(file));
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.port == 0 {
            return Err(ConfigError::Validation("relay.port must not be 0".to_string()));
        }
        if !self.relay.path.starts_with('/') {
            return Err(ConfigError::Validation("relay.path must start with '/'".to_string()));
        }

        validate_max_payload("relay.max_payload", self.relay.max_payload)?;
        validate_max_payload("peer.max_payload", self.peer.max_payload)?;

        if !self.peer.url.starts_with("ws://") {
            return Err(ConfigError::Validation("peer.url must be a ws:// URL".to_string()));
        }
        if self.peer.slot.is_empty() {
            return Err(ConfigError::Validation("peer.slot must not be empty".to_string()));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the commented example configuration to `path`
    pub fn write_example(path: &Path, force: bool) -> Result<(), ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_example())?;
        Ok(())
    }

    /// Generate example configuration file
    pub fn generate_example() -> String {
        let config = Config::default();

        format!(
            r#"# ClipRelay Configuration File
# Location: ~/.config/cliprelay/config.toml

# Logging level (trace, debug, info, warn, error)
log_level = "{}"

# Relay settings (cliprelay relay)
[relay]
# Interface and port to listen on
host = "{}"
port = {}
# Path accepting WebSocket connections
path = "{}"
# Largest accepted request in bytes
max_payload = {}

# Peer settings (cliprelay peer)
[peer]
# Relay to connect to
url = "{}"
# How often to check the local clipboard, in milliseconds
interval_ms = {}
# Shared slot name
slot = "{}"
# Largest request to send; keep in line with the relay's max_payload
max_payload = {}
# Sync a file instead of the system clipboard
# clipboard_file = "~/clipboard.txt"
"#,
            config.log_level,
            config.relay.host,
            config.relay.port,
            config.relay.path,
            config.relay.max_payload,
            config.peer.url,
            config.peer.interval_ms,
            config.peer.slot,
            config.peer.max_payload,
        )
    }
}

/// Payload limits must lie between 1KB and 50MB
fn validate_max_payload(field: &str, value: usize) -> Result<(), ConfigError> {
    if value < 1024 {
        let message = format!("{} must be at least 1024 bytes (1KB)", field);
        return Err(ConfigError::Validation(message));
    }
    if value > 52_428_800 {
        let message = format!("{} must not exceed 52428800 bytes (50MB)", field);
        return Err(ConfigError::Validation(message));
    }
    Ok(())
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}
