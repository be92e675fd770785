//! DuckDB storage backend implementation
//!
//! DuckDB suits the analytical side of match history (leaderboards, per-player
//! trends) while staying embedded.
//!
//! # Architecture
//!
//! - **schema**: Table definitions, applied idempotently by `initialize`
//! - **match_store**: Atomic match batches and history queries
//! - **player_archive**: Append-only player snapshots and the leaderboard
//!
//! # Connection Management
//!
//! DuckDB connections are not Sync, so we wrap them in Arc<Mutex<Connection>>
//! and use tokio::task::spawn_blocking for all database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::StorageError;
use crate::traits::{MatchStore, PlayerArchive, Storage};
use crate::types::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, PersistOutcome, PlayerSnapshot,
    PlayerStats, RoundRecord,
};

mod match_store;
mod player_archive;
mod schema;

/// DuckDB storage backend
///
/// # Examples
///
/// ```no_run
/// use matchlog_storage::backends::duckdb::DuckDbStorage;
/// use matchlog_storage::Storage;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = DuckDbStorage::new(":memory:").await?;
/// storage.initialize().await?;
/// # Ok(())
/// # }
/// ```
pub struct DuckDbStorage {
    conn: Arc<Mutex<duckdb::Connection>>,
}

impl DuckDbStorage {
    /// Open a DuckDB database
    ///
    /// * `path` - Database file path or `:memory:`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConnectionString` for an empty path and
    /// `StorageError::Connection` if the database cannot be opened.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        if path.is_empty() || path == "/" {
            return Err(StorageError::InvalidConnectionString(
                "missing database path (use duckdb:///path/to/db.duckdb or duckdb://:memory:)"
                    .to_string(),
            ));
        }

        let path = path.to_string();

        // Open connection in spawn_blocking since it may do I/O
        let conn = tokio::task::spawn_blocking(move || {
            if path == ":memory:" {
                duckdb::Connection::open_in_memory()
            } else {
                duckdb::Connection::open(&path)
            }
        })
        .await
        .map_err(|e| StorageError::connection("failed to spawn blocking task", e))?
        .map_err(|e| StorageError::connection("failed to open DuckDB connection", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Connection handle for the sub-modules' spawn_blocking closures
    fn conn(&self) -> Arc<Mutex<duckdb::Connection>> {
        Arc::clone(&self.conn)
    }
}

/// `query_row` that maps "no rows" to `None`
fn optional<T>(result: duckdb::Result<T>) -> duckdb::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl MatchStore for DuckDbStorage {
    async fn persist_match(&self, batch: MatchBatch) -> Result<PersistOutcome, StorageError> {
        self.persist_match_impl(batch).await
    }

    async fn find_duplicate(
        &self,
        ended_at: DateTime<Utc>,
        map: &str,
    ) -> Result<Option<MatchId>, StorageError> {
        self.find_duplicate_impl(ended_at, map).await
    }

    async fn get_match(&self, id: MatchId) -> Result<MatchRecord, StorageError> {
        self.get_match_impl(id).await
    }

    async fn list_matches(&self, limit: Option<u32>) -> Result<Vec<MatchRecord>, StorageError> {
        self.list_matches_impl(limit).await
    }

    async fn load_rounds(&self, id: MatchId) -> Result<Vec<RoundRecord>, StorageError> {
        self.load_rounds_impl(id).await
    }

    async fn load_events(&self, id: MatchId) -> Result<Vec<EventRecord>, StorageError> {
        self.load_events_impl(id).await
    }

    async fn load_accolades(&self, id: MatchId) -> Result<Vec<AccoladeRecord>, StorageError> {
        self.load_accolades_impl(id).await
    }

    async fn count_matches(&self) -> Result<i64, StorageError> {
        self.count_matches_impl().await
    }
}

#[async_trait]
impl PlayerArchive for DuckDbStorage {
    async fn archive_player_snapshot(&self, snapshot: PlayerSnapshot) -> Result<(), StorageError> {
        self.archive_player_snapshot_impl(snapshot).await
    }

    async fn latest_snapshot(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerSnapshot>, StorageError> {
        self.latest_snapshot_impl(player_id).await
    }

    async fn player_history(
        &self,
        player_id: &str,
    ) -> Result<Vec<PlayerSnapshot>, StorageError> {
        self.player_history_impl(player_id).await
    }

    async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<PlayerStats>, StorageError> {
        self.leaderboard_impl(limit).await
    }
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn initialize(&self) -> Result<(), StorageError> {
        schema::initialize_schema(self).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();

            // Simple health check: verify we can execute a query
            conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
                .map_err(|e| StorageError::connection("health check query failed", e))?;

            let tables: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'matches'",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| StorageError::connection("health check: failed to verify schema", e))?;

            if tables == 0 {
                return Err(StorageError::connection(
                    "health check: schema not initialized (matches table missing)",
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "schema not initialized - call initialize() first",
                    ),
                ));
            }

            Ok(())
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during health check", e))?
    }

    async fn close(&self) -> Result<(), StorageError> {
        // DuckDB connections don't need explicit close in Rust
        // The Drop impl handles cleanup
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_memory_database() {
        let storage = DuckDbStorage::new(":memory:").await;
        assert!(storage.is_ok());
    }

    #[tokio::test]
    async fn test_new_rejects_missing_path() {
        match DuckDbStorage::new("").await {
            Err(StorageError::InvalidConnectionString(msg)) => {
                assert!(msg.contains("missing database path"));
            }
            _ => panic!("expected InvalidConnectionString error"),
        }
    }

    #[tokio::test]
    async fn test_health_check_requires_schema() {
        let storage = DuckDbStorage::new(":memory:").await.unwrap();
        assert!(storage.health_check().await.is_err());

        storage.initialize().await.unwrap();
        assert!(storage.health_check().await.is_ok());
    }
}
