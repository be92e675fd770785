//! Storage configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing storage configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL format: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Unsupported URL scheme
    #[error("Unsupported URL scheme: {0}. Supported schemes: sqlite, duckdb")]
    UnsupportedScheme(String),

    /// Invalid busy timeout
    #[error("Invalid busy timeout: {0}")]
    InvalidBusyTimeout(String),
}

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// SQLite backend
    Sqlite,
    /// DuckDB backend
    DuckDb,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend type
    pub backend: BackendType,

    /// Database file path, or `:memory:`
    pub connection_string: String,

    /// How long a writer waits on a locked database, in milliseconds (SQLite only)
    pub busy_timeout_ms: Option<u64>,
}

impl StorageConfig {
    /// Parse connection URL into storage configuration
    ///
    /// Supported URL formats:
    /// - `sqlite://:memory:` - In-memory SQLite
    /// - `sqlite:///path/to/db.sqlite` - File-based SQLite
    /// - `sqlite:///path/to/db.sqlite?busy_timeout_ms=5000` - With busy timeout
    /// - `duckdb://:memory:` - In-memory DuckDB
    /// - `duckdb:///path/to/db.duckdb` - File-based DuckDB
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the URL cannot be parsed.
    /// Returns `ConfigError::UnsupportedScheme` if the URL scheme is not supported.
    /// Returns `ConfigError::InvalidBusyTimeout` if busy_timeout_ms is not a number.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        // :memory: is not a valid URL host, parse it as a path instead
        let normalized_url = if url.contains("://:memory:") {
            url.replace("://:memory:", ":///memory:")
        } else {
            url.to_string()
        };

        let parsed = url::Url::parse(&normalized_url)?;

        let backend = match parsed.scheme() {
            "sqlite" => BackendType::Sqlite,
            "duckdb" => BackendType::DuckDb,
            scheme => return Err(ConfigError::UnsupportedScheme(scheme.to_string())),
        };

        let path = parsed.path();
        let connection_string = if path == "/memory:" || path == "/:memory:" {
            ":memory:".to_string()
        } else if parsed.host_str() == Some(".") {
            // sqlite://./relative/path
            format!(".{}", path)
        } else {
            path.to_string()
        };

        let busy_timeout_ms = if backend == BackendType::Sqlite {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "busy_timeout_ms")
                .map(|(_, value)| {
                    value
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidBusyTimeout(value.to_string()))
                })
                .transpose()?
        } else {
            None
        };

        Ok(Self {
            backend,
            connection_string,
            busy_timeout_ms,
        })
    }

    /// Create in-memory SQLite configuration for testing
    #[must_use]
    pub fn sqlite_memory() -> Self {
        Self {
            backend: BackendType::Sqlite,
            connection_string: ":memory:".to_string(),
            busy_timeout_ms: None,
        }
    }

    /// Create file-based SQLite configuration
    #[must_use]
    pub fn sqlite_file(path: &str) -> Self {
        Self {
            backend: BackendType::Sqlite,
            connection_string: path.to_string(),
            busy_timeout_ms: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::sqlite_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sqlite_memory() {
        let config = StorageConfig::from_url("sqlite://:memory:").unwrap();
        assert_eq!(config.backend, BackendType::Sqlite);
        assert_eq!(config.connection_string, ":memory:");
        assert_eq!(config.busy_timeout_ms, None);
    }

    #[test]
    fn test_parse_sqlite_file() {
        let config = StorageConfig::from_url("sqlite:///var/lib/matchlog/db.sqlite").unwrap();
        assert_eq!(config.backend, BackendType::Sqlite);
        assert_eq!(config.connection_string, "/var/lib/matchlog/db.sqlite");
    }

    #[test]
    fn test_parse_sqlite_relative() {
        let config = StorageConfig::from_url("sqlite://./data/db.sqlite").unwrap();
        assert_eq!(config.connection_string, "./data/db.sqlite");
    }

    #[test]
    fn test_parse_sqlite_with_busy_timeout() {
        let config =
            StorageConfig::from_url("sqlite:///var/lib/matchlog/db.sqlite?busy_timeout_ms=2500")
                .unwrap();
        assert_eq!(config.connection_string, "/var/lib/matchlog/db.sqlite");
        assert_eq!(config.busy_timeout_ms, Some(2500));
    }

    #[test]
    fn test_parse_duckdb_memory() {
        let config = StorageConfig::from_url("duckdb://:memory:").unwrap();
        assert_eq!(config.backend, BackendType::DuckDb);
        assert_eq!(config.connection_string, ":memory:");
    }

    #[test]
    fn test_parse_duckdb_file() {
        let config = StorageConfig::from_url("duckdb:///data/matchlog.duckdb").unwrap();
        assert_eq!(config.backend, BackendType::DuckDb);
        assert_eq!(config.connection_string, "/data/matchlog.duckdb");
    }

    #[test]
    fn test_parse_invalid_scheme() {
        let result = StorageConfig::from_url("mysql://localhost/db");
        match result {
            Err(ConfigError::UnsupportedScheme(scheme)) => {
                assert_eq!(scheme, "mysql");
            }
            _ => panic!("Expected UnsupportedScheme error"),
        }
    }

    #[test]
    fn test_parse_invalid_url() {
        let result = StorageConfig::from_url("not a url");
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_invalid_busy_timeout() {
        let result = StorageConfig::from_url("sqlite:///db.sqlite?busy_timeout_ms=soon");
        match result {
            Err(ConfigError::InvalidBusyTimeout(val)) => assert_eq!(val, "soon"),
            _ => panic!("Expected InvalidBusyTimeout error"),
        }
    }

    #[test]
    fn test_default() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, BackendType::Sqlite);
        assert_eq!(config.connection_string, ":memory:");
    }
}
