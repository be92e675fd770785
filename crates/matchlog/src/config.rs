//! Application configuration
//!
//! ```toml
//! [source]
//! name = "eu-west-1"
//!
//! [database]
//! url = "sqlite:///var/lib/matchlog/matchlog.sqlite"
//!
//! [flush]
//! timeout_secs = 10
//! spool_path = "/var/lib/matchlog/spool.log"
//!
//! [rating]
//! initial_rating = 1000.0
//! k_factor = 25.0
//!
//! [metrics]
//! prometheus_bind = "127.0.0.1:9187"
//! ```

use matchlog_storage::StorageConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ingest::rating::{RatingConfig, RatingError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("database configuration requires either 'path' or 'url'")]
    MissingDatabase,

    #[error("Storage configuration error: {0}")]
    Storage(#[from] matchlog_storage::ConfigError),

    #[error("Invalid rating configuration: {0}")]
    InvalidRating(#[from] RatingError),

    #[error("flush.timeout_secs must be greater than zero")]
    InvalidFlushTimeout,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Identity recorded on every match ingested from this source
    pub name: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
        }
    }
}

/// Database/storage configuration
///
/// Supports two formats:
/// - `path = "/path/to/matchlog.sqlite"` - legacy format, converted to a sqlite:// URL
/// - `url = "duckdb:///path/to/matchlog.duckdb"` - URL format
///
/// If both are specified, `url` takes precedence.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            path: None,
            url: Some(url.into()),
        }
    }

    /// Get the storage URL, converting from legacy path format if needed
    pub fn storage_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let path = self.path.as_ref().ok_or(ConfigError::MissingDatabase)?;
        let path_str = path.to_string_lossy();
        if path_str.starts_with('/') {
            Ok(format!("sqlite://{}", path_str))
        } else {
            Ok(format!("sqlite://./{}", path_str))
        }
    }

    pub fn storage_config(&self) -> Result<StorageConfig, ConfigError> {
        Ok(StorageConfig::from_url(&self.storage_url()?)?)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FlushConfig {
    /// Upper bound on one flush attempt, storage wait included
    pub timeout_secs: u64,

    /// Raw lines of matches that could not be flushed, for `matchlog retry`
    pub spool_path: PathBuf,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            spool_path: PathBuf::from("matchlog-spool.log"),
        }
    }
}

impl FlushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub prometheus_bind: Option<SocketAddr>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub flush: FlushConfig,

    #[serde(default)]
    pub rating: RatingConfig,

    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            database: DatabaseConfig::from_url("sqlite://./matchlog.sqlite"),
            flush: FlushConfig::default(),
            rating: RatingConfig::default(),
            metrics: None,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.storage_config()?;
        self.rating.validate()?;
        if self.flush.timeout_secs == 0 {
            return Err(ConfigError::InvalidFlushTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchlog_storage::BackendType;
    use std::io::Write;

    #[test]
    fn test_config_parse_minimal() {
        let config = Config::parse(
            r#"
            [database]
            url = "sqlite://:memory:"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.name, "default");
        assert_eq!(config.flush.timeout(), Duration::from_secs(10));
        assert_eq!(config.rating, RatingConfig::default());
        assert!(config.metrics.is_none());
        assert_eq!(
            config.database.storage_config().unwrap(),
            StorageConfig::sqlite_memory()
        );
    }

    #[test]
    fn test_config_parse_full() {
        let config = Config::parse(
            r#"
            [source]
            name = "eu-west-1"

            [database]
            url = "duckdb:///var/lib/matchlog/matchlog.duckdb"

            [flush]
            timeout_secs = 3
            spool_path = "/tmp/spool.log"

            [rating]
            k_factor = 40.0

            [rating.weights]
            kills = 0.5

            [metrics]
            prometheus_bind = "127.0.0.1:9187"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.name, "eu-west-1");
        assert_eq!(
            config.database.storage_config().unwrap().backend,
            BackendType::DuckDb
        );
        assert_eq!(config.flush.timeout_secs, 3);
        assert_eq!(config.flush.spool_path, PathBuf::from("/tmp/spool.log"));
        assert_eq!(config.rating.k_factor, 40.0);
        assert_eq!(config.rating.initial_rating, 1000.0);
        assert_eq!(config.rating.weights.kills, 0.5);
        assert_eq!(config.rating.weights.damage, 0.25);
        assert_eq!(
            config.metrics.unwrap().prometheus_bind,
            Some("127.0.0.1:9187".parse().unwrap())
        );
    }

    #[test]
    fn test_config_missing_database_section() {
        let result = Config::parse("[source]\nname = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_empty_database_section() {
        let result = Config::parse("[database]\n");
        assert!(matches!(result, Err(ConfigError::MissingDatabase)));
    }

    #[test]
    fn test_config_unsupported_scheme() {
        let result = Config::parse("[database]\nurl = \"postgres://localhost/db\"\n");
        assert!(matches!(result, Err(ConfigError::Storage(_))));
    }

    #[test]
    fn test_config_rejects_bad_rating() {
        let result = Config::parse(
            r#"
            [database]
            url = "sqlite://:memory:"

            [rating]
            k_factor = -1.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidRating(_))));
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let result = Config::parse(
            r#"
            [database]
            url = "sqlite://:memory:"

            [flush]
            timeout_secs = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidFlushTimeout)));
    }

    #[test]
    fn test_legacy_path_converted() {
        let absolute = DatabaseConfig {
            path: Some(PathBuf::from("/var/lib/matchlog/db.sqlite")),
            url: None,
        };
        assert_eq!(
            absolute.storage_url().unwrap(),
            "sqlite:///var/lib/matchlog/db.sqlite"
        );

        let relative = DatabaseConfig {
            path: Some(PathBuf::from("data/db.sqlite")),
            url: None,
        };
        assert_eq!(relative.storage_url().unwrap(), "sqlite://./data/db.sqlite");
    }

    #[test]
    fn test_url_takes_precedence_over_path() {
        let db = DatabaseConfig {
            path: Some(PathBuf::from("/ignored.sqlite")),
            url: Some("duckdb://:memory:".into()),
        };
        assert_eq!(db.storage_url().unwrap(), "duckdb://:memory:");
    }

    #[test]
    fn test_from_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(temp_file, "[database]\npath = \"/tmp/matchlog.sqlite\"").unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.database.storage_url().unwrap(),
            "sqlite:///tmp/matchlog.sqlite"
        );
    }

    #[test]
    fn test_from_missing_file() {
        let result = Config::from_file("/nonexistent/matchlog.toml");
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
