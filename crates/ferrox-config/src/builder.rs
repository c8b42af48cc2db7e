//! Layered configuration loading

use crate::{validate, Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

/// Configuration builder for loading configuration from multiple sources
///
/// Sources are applied in the order they were added, on top of the defaults.
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source; missing files are ignored
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        let defaults_value = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::Serialization {
                format: "YAML",
                message: format!("defaults: {}", e),
            })?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator(&self.env_separator)
                            .separator(&self.env_separator),
                    );
                }
                ConfigSource::Defaults => {}
            }
        }

        let config: Config = self.inner.build()?.try_deserialize()?;
        validate(&config)?;
        Ok(config)
    }

    /// Try to build the configuration, returning defaults on error
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Detect file format from extension, defaulting to YAML
pub(crate) fn detect_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Yaml,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().add_defaults().build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_builder_yaml_file() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            temp_file,
            r#"
session:
  host_name: files.example.com
  remote_directory: /data
  protocol: ftp
engine:
  confirm_overwriting: false
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.session.host_name, "files.example.com");
        assert_eq!(config.session.remote_directory, "/data");
        assert_eq!(config.session.protocol, ferrox_types::FsProtocol::Ftp);
        assert!(!config.engine.confirm_overwriting);
        assert!(config.session.cache_directories);
    }

    #[test]
    fn test_builder_validation() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            temp_file,
            r#"
engine:
  tunnel_local_port_number_low: 9000
  tunnel_local_port_number_high: 8000
"#
        )
        .unwrap();

        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Tunnel local port range is empty"));
    }

    #[test]
    fn test_detect_format() {
        assert!(matches!(detect_format(Path::new("a.toml")), FileFormat::Toml));
        assert!(matches!(detect_format(Path::new("a.json")), FileFormat::Json));
        assert!(matches!(detect_format(Path::new("a.yml")), FileFormat::Yaml));
    }
}
