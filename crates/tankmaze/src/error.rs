//! Unified error type for the relay.

use std::path::PathBuf;

use tankmaze_protocol::ProtocolError;
use tankmaze_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// The `#[from]` variants let `?` lift sub-crate errors without
/// explicit mapping.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Socket accept, read or write failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed or oversized frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`RelayConfig`](crate::RelayConfig).
    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O on the listening socket outside of accept.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: RelayError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, RelayError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: RelayError = ProtocolError::Empty.into();
        assert!(matches!(err, RelayError::Protocol(_)));
    }

    #[test]
    fn test_config_read_error_names_path() {
        let err = RelayError::ConfigRead {
            path: PathBuf::from("/nope/relay.json"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/nope/relay.json"));
    }
}
