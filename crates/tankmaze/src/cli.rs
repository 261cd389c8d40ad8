//! Command-line arguments for the `tankmaze-relay` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::{RelayConfig, RelayError};

/// TCP relay for two-player Tank Maze sessions.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long, env = "TANKMAZE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on [default: 0.0.0.0:9999]
    #[arg(short, long, env = "TANKMAZE_BIND")]
    pub bind: Option<String>,

    /// Largest accepted inbound frame payload, in bytes
    #[arg(long, env = "TANKMAZE_MAX_FRAME_LEN")]
    pub max_frame_len: Option<usize>,

    /// Close connections idle for this many seconds
    #[arg(long, env = "TANKMAZE_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Close connections whose writes stall for this many seconds
    #[arg(long, env = "TANKMAZE_WRITE_TIMEOUT_SECS")]
    pub write_timeout_secs: Option<u64>,

    /// Maximum number of live rooms
    #[arg(long, env = "TANKMAZE_MAX_ROOMS")]
    pub max_rooms: Option<usize>,
}

impl Cli {
    /// Resolves the effective configuration: defaults, then the config
    /// file, then flags.
    pub fn resolve(&self) -> Result<RelayConfig, RelayError> {
        let base = match &self.config {
            Some(path) => RelayConfig::from_json_file(path)?,
            None => RelayConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Overlays every flag that was given onto `config`.
    pub fn apply(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if self.max_frame_len.is_some() {
            config.max_frame_len = self.max_frame_len;
        }
        if self.idle_timeout_secs.is_some() {
            config.idle_timeout_secs = self.idle_timeout_secs;
        }
        if self.write_timeout_secs.is_some() {
            config.write_timeout_secs = self.write_timeout_secs;
        }
        if self.max_rooms.is_some() {
            config.max_rooms = self.max_rooms;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_no_flags_keeps_config() {
        let base = RelayConfig {
            max_rooms: Some(3),
            ..RelayConfig::default()
        };
        assert_eq!(Cli::default().apply(base.clone()), base);
    }

    #[test]
    fn test_apply_flags_override_file_values() {
        let cli = Cli::try_parse_from([
            "tankmaze-relay",
            "--bind",
            "127.0.0.1:4000",
            "--max-frame-len",
            "1024",
        ])
        .unwrap();
        let base = RelayConfig {
            max_frame_len: Some(99),
            max_rooms: Some(5),
            ..RelayConfig::default()
        };
        let config = cli.apply(base);
        assert_eq!(config.bind, "127.0.0.1:4000");
        assert_eq!(config.max_frame_len, Some(1024));
        assert_eq!(config.max_rooms, Some(5));
    }

    #[test]
    fn test_resolve_without_file_uses_defaults() {
        let config = Cli::default().resolve().unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_parse_rejects_non_numeric_limit() {
        assert!(Cli::try_parse_from(["tankmaze-relay", "--max-rooms", "lots"]).is_err());
    }
}
