//! Configuration builder for layered configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration builder for loading configuration from multiple sources
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

    /// Add a configuration file source; missing files are skipped at build time
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
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

    /// Build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // Defaults always form the base layer
        let defaults = Config::default();
        let defaults_value = serde_yaml::to_value(&defaults)
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
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
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Defaults => {
                    // Already handled above
                }
            }
        }

        let config = self.inner.build()?;
        let result: Config = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.remote.host.trim().is_empty() {
            return Err(ConfigError::validation("Remote host must not be empty"));
        }

        if config.remote.port == 0 {
            return Err(ConfigError::validation(
                "Remote port must be greater than 0",
            ));
        }

        if config.remote.connect_timeout_ms == 0 || config.remote.io_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "Remote timeouts must be greater than 0",
            ));
        }

        let ledger = config.sync.ledger_name.as_str();
        if ledger.is_empty() || ledger.contains('/') {
            return Err(ConfigError::validation(
                "Ledger name must be a plain, non-empty file name",
            ));
        }

        if config.sync.chunk_size < 512 {
            return Err(ConfigError::validation(
                "Chunk size must be at least 512 bytes",
            ));
        }

        if config.sync.poll_interval_ms == 0 || config.sync.settle_threshold_ms == 0 {
            return Err(ConfigError::validation(
                "Poll interval and settle threshold must be greater than 0",
            ));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpsync_types::DigestAlgorithm;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().add_defaults().build().unwrap();
        assert_eq!(config.remote.port, 2121);
        assert_eq!(config.sync.digest, DigestAlgorithm::Md5);
        assert!(config.sync.delete_before_store);
    }

    #[test]
    fn test_builder_yaml_file() {
        let mut temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
remote:
  host: ftp.example.net
  port: 21
sync:
  digest: blake3
  settle_threshold_ms: 750
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.remote.host, "ftp.example.net");
        assert_eq!(config.remote.port, 21);
        assert_eq!(config.remote.username, "anonymous");
        assert_eq!(config.sync.digest, DigestAlgorithm::Blake3);
        assert_eq!(config.sync.settle_threshold_ms, 750);
        assert_eq!(config.sync.poll_interval_ms, 100);
    }

    #[test]
    fn test_builder_toml_file() {
        let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
[sync]
ledger_name = ".hashes"
chunk_size = 65536
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.sync.ledger_name, ".hashes");
        assert_eq!(config.sync.chunk_size, 65536);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file("/definitely/not/here/ftpsync.yaml")
            .build()
            .unwrap();
        assert_eq!(config.remote.host, "127.0.0.1");
    }

    #[rstest]
    #[case("remote:\n  port: 0\n", "Remote port must be greater than 0")]
    #[case("sync:\n  ledger_name: a/b\n", "Ledger name")]
    #[case("sync:\n  chunk_size: 16\n", "Chunk size")]
    #[case("sync:\n  settle_threshold_ms: 0\n", "settle threshold")]
    #[case("logging:\n  level: loud\n", "Log level")]
    fn test_builder_validation(#[case] yaml: &str, #[case] expected: &str) {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        temp_file.flush().unwrap();

        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(expected));
    }
}
