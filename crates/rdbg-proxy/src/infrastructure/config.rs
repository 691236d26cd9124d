//! TOML configuration for the proxy.
//!
//! The proxy reads a single file named on the command line. Every field has
//! a default, so a missing file or a file with only some sections is valid:
//!
//! ```toml
//! [network]
//! bind_address = "127.0.0.1"
//! port = 8089
//!
//! [protocol]
//! max_frame_bytes = 16777216
//!
//! [proxy]
//! log_level = "debug"
//! allow_shell = false
//!
//! [program]
//! file = "index.php"
//! entry_line = 1
//! last_line = 40
//! call_stack = ["main()"]
//!
//! [program.globals]
//! "$user" = "'alice'"
//!
//! [[program.throws]]
//! line = 12
//! class = "RuntimeException"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rdbg_core::protocol::codec::DEFAULT_MAX_FRAME_LEN;
use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The program section describes an impossible program.
    #[error("invalid [program] section: {0}")]
    InvalidProgram(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level proxy configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub program: ProgramConfig,
}

/// Listening socket settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address to bind to. `"0.0.0.0"` accepts remote clients.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Wire protocol limits.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// Frames announcing a larger body are rejected before allocation.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

/// Behaviour of the proxy itself.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProxySettings {
    /// `tracing` log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether `!` commands may spawn processes on the proxy host.
    #[serde(default)]
    pub allow_shell: bool,
}

/// The program each session debugs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProgramConfig {
    /// Source file reported in interrupt locations.
    #[serde(default = "default_file")]
    pub file: String,
    #[serde(default = "default_entry_line")]
    pub entry_line: u32,
    /// Execution finishes after this line.
    #[serde(default = "default_last_line")]
    pub last_line: u32,
    /// Function names from the outermost frame inwards.
    #[serde(default = "default_call_stack")]
    pub call_stack: Vec<String>,
    /// Global variables and their printed values.
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
    /// Lines that throw an exception when executed.
    #[serde(default)]
    pub throws: Vec<ThrowSite>,
}

/// A line that throws `class` when executed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThrowSite {
    pub line: u32,
    pub class: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8089
}
fn default_max_frame_bytes() -> u32 {
    DEFAULT_MAX_FRAME_LEN
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_file() -> String {
    "index.php".to_string()
}
fn default_entry_line() -> u32 {
    1
}
fn default_last_line() -> u32 {
    20
}
fn default_call_stack() -> Vec<String> {
    vec!["main()".to_string()]
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            allow_shell: false,
        }
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
            entry_line: default_entry_line(),
            last_line: default_last_line(),
            call_stack: default_call_stack(),
            globals: BTreeMap::new(),
            throws: Vec::new(),
        }
    }
}

impl ProgramConfig {
    /// Checks the line range and call stack.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProgram`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_line == 0 {
            return Err(ConfigError::InvalidProgram(
                "entry_line starts at 1".to_string(),
            ));
        }
        if self.last_line < self.entry_line {
            return Err(ConfigError::InvalidProgram(format!(
                "last_line {} is before entry_line {}",
                self.last_line, self.entry_line
            )));
        }
        if self.call_stack.is_empty() {
            return Err(ConfigError::InvalidProgram(
                "call_stack needs at least one frame".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `ProxyConfig` from `path`, returning `ProxyConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::InvalidProgram`] if the program section is inconsistent.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<ProxyConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProxyConfig::default(),
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    cfg.program.validate()?;
    Ok(cfg)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
