//! TOML-based configuration for the responder.
//!
//! ```toml
//! [server]
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 65432
//!
//! [cipher]
//! q = 32452843
//! max_keys = 4096
//! ```
//!
//! Every section and field is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` use the return value of `some_fn()` when
//! absent, so a partial file (or no file at all) still yields a usable config.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use polycipher_core::protocol::messages::MAX_KEY_TABLE_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::respond::ResponderSettings;

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

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` and `port` do not form a socket address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    /// `max_keys` is outside what the protocol can carry.
    #[error("max_keys {0} must be between 1 and {MAX_KEY_TABLE_LEN}")]
    InvalidMaxKeys(usize),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level responder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub cipher: CipherSection,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Responder cipher parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CipherSection {
    /// The responder's Q.
    #[serde(default = "default_q")]
    pub q: u64,
    /// FCMs asking for a larger table are dropped.
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    65432
}
fn default_q() -> u64 {
    32_452_843
}
fn default_max_keys() -> usize {
    4096
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for CipherSection {
    fn default() -> Self {
        Self {
            q: default_q(),
            max_keys: default_max_keys(),
        }
    }
}

impl ServerConfig {
    /// Resolves `bind_address:port`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] when the pair does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.network.bind_address, self.network.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }

    /// Builds the per-connection responder settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMaxKeys`] for a zero or oversized `max_keys`.
    pub fn responder_settings(&self) -> Result<ResponderSettings, ConfigError> {
        let max_keys = self.cipher.max_keys;
        if max_keys == 0 || max_keys > MAX_KEY_TABLE_LEN {
            return Err(ConfigError::InvalidMaxKeys(max_keys));
        }
        Ok(ResponderSettings {
            q: self.cipher.q,
            max_keys,
        })
    }

    /// Renders the config as TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the config at `path`, returning `ServerConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
