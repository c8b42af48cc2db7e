//! Configuration management for the Ferrox session engine
//!
//! Sessions never read global settings. Everything a session consults is held
//! in a [`SessionConfig`] (per connection) and an [`EngineConfig`] (policy
//! shared by all sessions), both passed in by value at construction.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: consistency checks run after every load
//! - **Environment overrides**: `FERROX__SESSION__HOST_NAME=example.com` style variables
//! - **Defaults**: sensible default values for all options
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrox_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ferrox.yaml")
//!     .add_env_prefix("FERROX")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Connecting to {}", config.session.session_name());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrox_types::FsProtocol;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub session: SessionConfig,
    /// Engine-wide policy
    pub engine: EngineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Settings of one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Display name, derived from user and host when empty
    pub name: String,
    /// Requested protocol
    pub protocol: FsProtocol,
    /// Server host
    pub host_name: String,
    /// Server port
    pub port_number: u16,
    /// Login name
    pub user_name: String,
    /// Login password
    pub password: Option<String>,
    /// Directory to change to after login
    pub remote_directory: String,
    /// Keep directory listings in memory
    pub cache_directories: bool,
    /// Remember how directory changes resolved
    pub cache_directory_changes: bool,
    /// Persist remembered directory changes between sessions
    pub preserve_directory_changes: bool,
    /// Present the login directory as the root
    pub lock_in_home: bool,
    /// Resolve symbolic links in listings
    pub resolve_symlinks: bool,
    /// Move deleted files to the recycle bin
    pub delete_to_recycle_bin: bool,
    /// Remote recycle bin directory
    pub recycle_bin_path: String,
    /// Load user and group names after login
    pub lookup_user_groups: bool,
    /// Keep the password entered at login for secondary connections
    pub remember_password: bool,
    /// Tunnel settings
    pub tunnel: TunnelConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            protocol: FsProtocol::Sftp,
            host_name: String::new(),
            port_number: 22,
            user_name: String::new(),
            password: None,
            remote_directory: String::new(),
            cache_directories: true,
            cache_directory_changes: true,
            preserve_directory_changes: false,
            lock_in_home: false,
            resolve_symlinks: true,
            delete_to_recycle_bin: false,
            recycle_bin_path: String::new(),
            lookup_user_groups: true,
            remember_password: true,
            tunnel: TunnelConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Name used in logs and prompts
    pub fn session_name(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if self.user_name.is_empty() {
            self.host_name.clone()
        } else {
            format!("{}@{}", self.user_name, self.host_name)
        }
    }

    /// Key identifying the server for persisted per-server state
    pub fn storage_key(&self) -> String {
        format!("{}@{}:{}", self.user_name, self.host_name, self.port_number)
    }
}

/// Settings of the port-forwarding tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Connect through a tunnel
    pub enabled: bool,
    /// Tunnel host
    pub host_name: String,
    /// Tunnel port
    pub port_number: u16,
    /// Tunnel login name
    pub user_name: String,
    /// Tunnel password
    pub password: Option<String>,
    /// Private key for the tunnel login
    pub public_key_file: Option<PathBuf>,
    /// Local end of the forward, 0 to pick a free one
    pub local_port_number: u16,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host_name: String::new(),
            port_number: 22,
            user_name: String::new(),
            password: None,
            public_key_file: None,
            local_port_number: 0,
        }
    }
}

/// Policy shared by all sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reload the listing after operations that modify files
    pub auto_read_directory_after_op: bool,
    /// Delay after which a reconnect question answers itself with Retry, 0 to wait
    pub session_reopen_auto_ms: u64,
    /// Give up reconnecting after this long, 0 for never
    pub session_reopen_timeout_ms: u64,
    /// Lowest local port tried for tunnels
    pub tunnel_local_port_number_low: u16,
    /// Highest local port tried for tunnels
    pub tunnel_local_port_number_high: u16,
    /// Ask before overwriting files
    pub confirm_overwriting: bool,
    /// Maximum number of remembered directory changes
    pub cache_directory_changes_max_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_read_directory_after_op: true,
            session_reopen_auto_ms: 5000,
            session_reopen_timeout_ms: 120_000,
            tunnel_local_port_number_low: 50000,
            tunnel_local_port_number_high: 50099,
            confirm_overwriting: true,
            cache_directory_changes_max_size: 100,
        }
    }
}

impl EngineConfig {
    /// Auto-answer delay of the reconnect question
    pub fn session_reopen_auto(&self) -> Option<Duration> {
        (self.session_reopen_auto_ms > 0).then(|| Duration::from_millis(self.session_reopen_auto_ms))
    }

    /// Ceiling for reconnect attempts
    pub fn session_reopen_timeout(&self) -> Option<Duration> {
        (self.session_reopen_timeout_ms > 0)
            .then(|| Duration::from_millis(self.session_reopen_timeout_ms))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log file path
    pub log_file: Option<PathBuf>,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            json_format: false,
        }
    }
}

/// Check a configuration for consistency
pub fn validate(config: &Config) -> ConfigResult<()> {
    let session = &config.session;
    let engine = &config.engine;

    if session.port_number == 0 {
        return Err(ConfigError::ZeroPort {
            key: "session.port_number",
        });
    }

    if session.tunnel.enabled {
        if session.tunnel.host_name.is_empty() {
            return Err(ConfigError::MissingTunnelHost);
        }
        if session.tunnel.port_number == 0 {
            return Err(ConfigError::ZeroPort {
                key: "session.tunnel.port_number",
            });
        }
    }

    let (low, high) = (
        engine.tunnel_local_port_number_low,
        engine.tunnel_local_port_number_high,
    );
    if low > high {
        return Err(ConfigError::EmptyPortRange { low, high });
    }

    // 0 disables either limit
    let (auto_ms, timeout_ms) = (engine.session_reopen_auto_ms, engine.session_reopen_timeout_ms);
    if auto_ms > 0 && timeout_ms > 0 && auto_ms > timeout_ms {
        return Err(ConfigError::ReopenTimeouts {
            auto_ms,
            timeout_ms,
        });
    }

    if session.cache_directory_changes && engine.cache_directory_changes_max_size == 0 {
        return Err(ConfigError::ZeroChangesCacheSize);
    }

    if session.delete_to_recycle_bin && !session.recycle_bin_path.starts_with('/') {
        return Err(ConfigError::RelativeRecycleBin {
            path: session.recycle_bin_path.clone(),
        });
    }

    if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
        return Err(ConfigError::UnknownLogLevel {
            level: config.logging.level.clone(),
        });
    }

    Ok(())
}
