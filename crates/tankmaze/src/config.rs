//! Relay configuration.
//!
//! Loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. JSON config file (if given via `--config`)
//! 3. Command-line flags and their `TANKMAZE_*` environment variables
//!
//! Every limit is off by default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tankmaze_room::RegistryConfig;

use crate::RelayError;

/// Default listen address: all interfaces, the relay's fixed port.
pub const DEFAULT_BIND: &str = "0.0.0.0:9999";

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to listen on.
    pub bind: String,
    /// Largest inbound frame payload, in bytes. A larger declared length
    /// closes the connection.
    pub max_frame_len: Option<usize>,
    /// Close a connection that sends nothing for this many seconds.
    pub idle_timeout_secs: Option<u64>,
    /// Close a connection whose socket write stalls this many seconds.
    pub write_timeout_secs: Option<u64>,
    /// Cap on live rooms.
    pub max_rooms: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_frame_len: None,
            idle_timeout_secs: None,
            write_timeout_secs: None,
            max_rooms: None,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RelayError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content).map_err(|source| RelayError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }

    /// The subset of settings the room registry enforces.
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            max_rooms: self.max_rooms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_fixed_port_with_limits_off() {
        let config = RelayConfig::default();
        assert_eq!(config.bind, "0.0.0.0:9999");
        assert_eq!(config.max_frame_len, None);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.write_timeout(), None);
        assert_eq!(config.registry(), RegistryConfig::default());
    }

    #[test]
    fn test_from_json_str_partial_fills_defaults() {
        let config = RelayConfig::from_json_str(r#"{"max_rooms": 12, "idle_timeout_secs": 30}"#).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.registry().max_rooms, Some(12));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_json_str_invalid_rejected() {
        assert!(RelayConfig::from_json_str(r#"{"max_rooms": "many"}"#).is_err());
    }

    #[test]
    fn test_from_json_file_missing_reports_path() {
        let err = RelayConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, RelayError::ConfigRead { .. }));
    }

    #[test]
    fn test_from_json_file_roundtrips_saved_config() {
        let path = std::env::temp_dir().join(format!("tankmaze-config-{}.json", std::process::id()));
        let config = RelayConfig {
            bind: "127.0.0.1:7000".into(),
            max_frame_len: Some(4096),
            ..RelayConfig::default()
        };
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        let loaded = RelayConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
