//! Errors raised while loading, saving and checking settings
//!
//! Every check made by [`crate::validate`] has its own variant, so callers
//! can tell which setting was refused without parsing the message.

use std::path::PathBuf;

use ferrox_types::Error as FerroxError;
use thiserror::Error;

/// Failure to load, save or accept a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file could not be read or written
    #[error("Cannot access configuration file '{path}': {source}")]
    Io {
        /// File that was accessed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Settings could not be rendered in the requested format
    #[error("Cannot write settings as {format}: {message}")]
    Serialization {
        /// Target format
        format: &'static str,
        /// Serializer message
        message: String,
    },

    /// Merging defaults, files and environment variables failed
    #[error("Cannot merge configuration sources: {0}")]
    Sources(#[from] config::ConfigError),

    /// A port number is zero
    #[error("Port '{key}' must be greater than 0")]
    ZeroPort {
        /// Setting holding the port
        key: &'static str,
    },

    /// The tunnel is enabled without a host to go through
    #[error("Tunnel host name is required when the tunnel is enabled")]
    MissingTunnelHost,

    /// The local port range for tunnels holds no port
    #[error("Tunnel local port range {low}-{high} is empty")]
    EmptyPortRange {
        /// Lowest port
        low: u16,
        /// Highest port
        high: u16,
    },

    /// The reconnect question would only answer itself after reconnecting gave up
    #[error("Reconnect auto-answer delay of {auto_ms} ms exceeds the reconnect timeout of {timeout_ms} ms")]
    ReopenTimeouts {
        /// Auto-answer delay
        auto_ms: u64,
        /// Overall reconnect ceiling
        timeout_ms: u64,
    },

    /// Directory changes are remembered in a cache that can hold nothing
    #[error("Directory changes cache size must be greater than 0")]
    ZeroChangesCacheSize,

    /// Deleted files would go to a relative recycle bin
    #[error("Recycle bin path '{path}' must be absolute")]
    RelativeRecycleBin {
        /// Configured path
        path: String,
    },

    /// The log level is not a `tracing` level name
    #[error("Log level '{level}' is not one of: trace, debug, info, warn, error")]
    UnknownLogLevel {
        /// Configured level
        level: String,
    },
}

impl From<ConfigError> for FerroxError {
    fn from(error: ConfigError) -> Self {
        FerroxError::config(error.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Whether the settings were read but refused by validation
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::Io { .. } | Self::Serialization { .. } | Self::Sources(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_reach_the_session_as_config_errors() {
        let error = ConfigError::EmptyPortRange {
            low: 50100,
            high: 50000,
        };
        assert!(error.is_validation());

        let converted = FerroxError::from(error);
        assert_eq!(
            converted,
            FerroxError::config("Tunnel local port range 50100-50000 is empty")
        );
    }

    #[test]
    fn test_file_errors_are_not_validation_errors() {
        let error = ConfigError::Io {
            path: PathBuf::from("ferrox.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!error.is_validation());
        assert!(error.to_string().contains("ferrox.yaml"));
    }
}
