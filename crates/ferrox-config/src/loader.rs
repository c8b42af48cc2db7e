//! Configuration loader utilities

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "FERROX";

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the first file found in the default locations
    pub fn load_default() -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();
        if let Some(path) = Self::config_exists() {
            builder = builder.add_source_file(path);
        }
        builder.add_env_prefix(ENV_PREFIX).build()
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Configuration file not found",
                ),
            });
        }

        ConfigBuilder::new()
            .add_defaults()
            .add_source_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Load configuration from multiple files (later files override earlier ones)
    pub fn load_from_files<P: AsRef<Path>>(paths: &[P]) -> ConfigResult<Config> {
        paths
            .iter()
            .fold(ConfigBuilder::new().add_defaults(), |builder, path| {
                builder.add_source_file(path)
            })
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Save configuration to a file, choosing the format by extension
    pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(config).map_err(|e| ConfigError::Serialization {
                format: "TOML",
                message: e.to_string(),
            })?,
            Some("json") => {
                serde_json::to_string_pretty(config).map_err(|e| ConfigError::Serialization {
                    format: "JSON",
                    message: e.to_string(),
                })?
            }
            _ => serde_yaml::to_string(config).map_err(|e| ConfigError::Serialization {
                format: "YAML",
                message: e.to_string(),
            })?,
        };

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Generate a default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        Self::save_to_file(&Config::default(), path)
    }

    /// Default configuration file paths in order of preference
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("ferrox.yaml"),
            PathBuf::from("ferrox.yml"),
            PathBuf::from("ferrox.toml"),
            PathBuf::from(".ferrox.yaml"),
            PathBuf::from(".ferrox.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let ferrox_dir = config_dir.join("ferrox");
            paths.push(ferrox_dir.join("config.yaml"));
            paths.push(ferrox_dir.join("config.toml"));
        }

        #[cfg(unix)]
        {
            paths.push(PathBuf::from("/etc/ferrox/config.yaml"));
            paths.push(PathBuf::from("/etc/ferrox/config.toml"));
        }

        paths
    }

    /// Directory holding per-user state such as remembered directory changes
    pub fn state_directory() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ferrox"))
    }

    /// Check if a configuration file exists in default locations
    pub fn config_exists() -> Option<PathBuf> {
        Self::default_config_paths()
            .into_iter()
            .find(|path| path.exists())
    }

    /// Validate a configuration file by loading it
    pub fn validate_file<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        Self::load_from_file(path).map(|_| ())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME").ok().map(|home| {
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
            })
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|home| PathBuf::from(home).join(".config"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
