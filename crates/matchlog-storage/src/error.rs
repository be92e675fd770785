//! Storage error types

use std::error::Error as StdError;
use thiserror::Error;

use crate::types::MatchId;

/// Driver error carried as the source of a backend failure
pub type BoxedError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The player already has a snapshot for this match
    #[error("player {player_id} already archived for match {match_id}")]
    DuplicateSnapshot { player_id: String, match_id: String },

    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    /// Database could not be opened or reached
    #[error("connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// Statement or transaction failed; a batch write was rolled back
    #[error("query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("schema setup failed: {message}")]
    Migration {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Stored row that does not decode (bad id, timestamp, payload)
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

fn boxed(source: impl StdError + Send + Sync + 'static) -> Option<BoxedError> {
    Some(Box::new(source))
}

impl StorageError {
    pub fn connection(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: boxed(source),
        }
    }

    pub fn query(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Query {
            message: message.into(),
            source: boxed(source),
        }
    }

    pub fn migration(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Migration {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Whether writing the same batch again may succeed
    ///
    /// Corrupt rows, missing matches and bad configuration fail the same way
    /// on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Query { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_batch_write_failure_keeps_driver_source() {
        let driver = io::Error::new(io::ErrorKind::Other, "database is locked");
        let err = StorageError::query("failed to commit match batch", driver);

        assert_eq!(err.to_string(), "query failed: failed to commit match batch");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("database is locked"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_snapshot_and_match_errors() {
        let err = StorageError::DuplicateSnapshot {
            player_id: "[U:1:1001]".into(),
            match_id: "01J0000000000000000000000".into(),
        };
        assert_eq!(
            err.to_string(),
            "player [U:1:1001] already archived for match 01J0000000000000000000000"
        );
        assert!(!err.is_transient());

        let id = MatchId::new();
        let err = StorageError::MatchNotFound(id);
        assert_eq!(err.to_string(), format!("match {id} not found"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unreachable_store_is_transient() {
        let err = StorageError::connection(
            "failed to open SQLite database",
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
        );
        assert!(matches!(err, StorageError::Connection { source: Some(_), .. }));
        assert!(err.is_transient());
        assert!(!StorageError::InvalidData("timestamp out of range: -1".into()).is_transient());
    }
}
