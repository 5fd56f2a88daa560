//! TOML configuration file for the relay.
//!
//! Every field is optional.  A missing file section or key falls back to the
//! built-in default, and command-line flags override whatever the file says.
//!
//! ```toml
//! log_level = "info"
//!
//! [server]
//! bind_address = "0.0.0.0"
//! port = 3000
//!
//! [retry]
//! interval_secs = 3
//! max_retries = 3
//!
//! [queues]
//! outbound = 256
//! hub = 1024
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{DEFAULT_HUB_QUEUE, DEFAULT_OUTBOUND_QUEUE, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub queues: QueueSection,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Offer re-prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Queue capacities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSection {
    /// Frames buffered per connection.
    #[serde(default = "default_outbound")]
    pub outbound: usize,
    /// Commands buffered for the hub task.
    #[serde(default = "default_hub")]
    pub hub: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_interval_secs() -> u64 {
    cast_core::domain::registry::DEFAULT_RETRY_INTERVAL.as_secs()
}
fn default_max_retries() -> u32 {
    cast_core::domain::registry::DEFAULT_MAX_RETRIES
}
fn default_outbound() -> usize {
    DEFAULT_OUTBOUND_QUEUE
}
fn default_hub() -> usize {
    DEFAULT_HUB_QUEUE
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerSection::default(),
            retry: RetrySection::default(),
            queues: QueueSection::default(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            outbound: default_outbound(),
            hub: default_hub(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses config text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a value has the
/// wrong type.
pub fn parse_config(text: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Loads the config file at `path`.
///
/// Unlike the defaults-on-missing behaviour of an implicit config location,
/// a path the operator named explicitly must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its content is invalid.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
