//! TOML configuration for the initiator.
//!
//! ```toml
//! [client]
//! log_level = "warn"
//!
//! [network]
//! server_address = "127.0.0.1:65432"
//! ack_timeout_secs = 10
//!
//! [cipher]
//! p = 15485863
//! seed = 123456789
//! num_keys = 30
//! ```
//!
//! Missing sections and fields fall back to the values above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use polycipher_core::protocol::messages::MAX_KEY_TABLE_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::initiate::InitiatorSettings;

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

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `num_keys` is outside what an FCM can carry.
    #[error("num_keys {0} must be between 1 and {MAX_KEY_TABLE_LEN}")]
    InvalidKeyCount(usize),
}

/// Top-level initiator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub cipher: CipherSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSection {
    /// `tracing` level used when `RUST_LOG` is unset.  Kept quiet by default
    /// so log lines do not interleave with the menu.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// Responder address as `host:port`.
    #[serde(default = "default_server_address")]
    pub server_address: String,
    /// Seconds to wait for the FCM_ACK before giving up.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

/// Parameters sent in the FCM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CipherSection {
    #[serde(default = "default_p")]
    pub p: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_num_keys")]
    pub num_keys: usize,
}

fn default_log_level() -> String {
    "warn".to_string()
}
fn default_server_address() -> String {
    "127.0.0.1:65432".to_string()
}
fn default_ack_timeout_secs() -> u64 {
    10
}
fn default_p() -> u64 {
    15_485_863
}
fn default_seed() -> u64 {
    123_456_789
}
fn default_num_keys() -> usize {
    30
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

impl Default for CipherSection {
    fn default() -> Self {
        Self {
            p: default_p(),
            seed: default_seed(),
            num_keys: default_num_keys(),
        }
    }
}

impl ClientConfig {
    /// Builds the FCM parameters.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidKeyCount`] for a zero or oversized `num_keys`.
    pub fn initiator_settings(&self) -> Result<InitiatorSettings, ConfigError> {
        let num_keys = self.cipher.num_keys;
        if num_keys == 0 || num_keys > MAX_KEY_TABLE_LEN {
            return Err(ConfigError::InvalidKeyCount(num_keys));
        }
        Ok(InitiatorSettings {
            p: self.cipher.p,
            seed: self.cipher.seed,
            num_keys,
        })
    }

    /// A zero value would fail every handshake, so it is raised to one second.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.network.ack_timeout_secs.max(1))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Loads the config at `path`; a missing file yields `ClientConfig::default()`.
///
/// # Errors
///
/// [`ConfigError::Io`] for other file-system errors and
/// [`ConfigError::Parse`] for malformed TOML.
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

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_defaults_are_the_reference_parameters() {
        let cfg = ClientConfig::default();

        assert_eq!(cfg.network.server_address, "127.0.0.1:65432");
        assert_eq!(
            cfg.initiator_settings().unwrap(),
            InitiatorSettings { p: 15_485_863, seed: 123_456_789, num_keys: 30 }
        );
        assert_eq!(cfg.client.log_level, "warn");
    }

    #[test]
    fn test_partial_cipher_section_keeps_other_defaults() {
        // Arrange
        let toml_str = "[cipher]\nseed = 42\n";

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.cipher.seed, 42);
        assert_eq!(cfg.cipher.p, 15_485_863);
        assert_eq!(cfg.network, NetworkSection::default());
    }

    #[test]
    fn test_ack_timeout_defaults_and_floor() {
        let mut cfg: ClientConfig = toml::from_str("[network]\nack_timeout_secs = 3\n").unwrap();
        assert_eq!(cfg.ack_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.network.server_address, "127.0.0.1:65432");

        cfg.network.ack_timeout_secs = 0;
        assert_eq!(cfg.ack_timeout(), Duration::from_secs(1));

        assert_eq!(ClientConfig::default().ack_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_initiator_settings_validate_num_keys() {
        let mut cfg = ClientConfig::default();

        cfg.cipher.num_keys = 0;
        assert!(matches!(cfg.initiator_settings(), Err(ConfigError::InvalidKeyCount(0))));

        cfg.cipher.num_keys = MAX_KEY_TABLE_LEN + 1;
        assert!(cfg.initiator_settings().is_err());

        cfg.cipher.num_keys = MAX_KEY_TABLE_LEN;
        assert!(cfg.initiator_settings().is_ok());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut cfg = ClientConfig::default();
        cfg.network.server_address = "10.0.0.5:7000".to_string();

        let restored: ClientConfig = toml::from_str(&cfg.to_toml().unwrap()).unwrap();

        assert_eq!(restored, cfg);
    }

    #[test]
    fn test_wrong_field_type_is_parse_error() {
        let result: Result<ClientConfig, _> = toml::from_str("[cipher]\nnum_keys = \"many\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("polycipher_client_{}.toml", Uuid::new_v4()));
        assert_eq!(load_config(&path).unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_load_config_reads_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("polycipher_client_{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "[network]\nserver_address = \"192.168.1.9:65432\"\n").unwrap();

        // Act
        let loaded = load_config(&path);
        std::fs::remove_file(&path).ok();

        // Assert
        assert_eq!(loaded.unwrap().network.server_address, "192.168.1.9:65432");
    }
}
