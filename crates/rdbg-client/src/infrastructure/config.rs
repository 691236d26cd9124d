//! TOML configuration for the console client.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8089
//! connect_timeout_secs = 5
//!
//! [protocol]
//! version = 1
//!
//! [client]
//! log_level = "warn"
//! api_mode = false
//!
//! [options]
//! max_code_lines = 5
//! stack_args = false
//! ```
//!
//! `[options]` uses the same fields as the `set` command; anything left out
//! keeps its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rdbg_core::protocol::codec::{DEFAULT_MAX_FRAME_LEN, PROTOCOL_VERSION};
use rdbg_core::ClientOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub options: ClientOptions,
}

/// Where the proxy listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// Version stamped on every outgoing command.
    #[serde(default = "default_version")]
    pub version: i32,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSettings {
    /// `tracing` log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Starts the console in API mode regardless of `[options]`.
    #[serde(default)]
    pub api_mode: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8089
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_version() -> i32 {
    PROTOCOL_VERSION
}
fn default_max_frame_bytes() -> u32 {
    DEFAULT_MAX_FRAME_LEN
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ClientConfig {
    /// The options the console starts with.
    pub fn initial_options(&self) -> ClientOptions {
        let mut options = self.options.clone();
        options.api_mode |= self.client.api_mode;
        options
    }
}

/// Loads `ClientConfig` from `path`, returning the defaults if the file does
/// not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
