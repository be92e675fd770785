//! SQLite storage backend implementation using rusqlite
//!
//! # Architecture
//!
//! - **schema**: Table definitions, applied idempotently by `initialize`
//! - **match_store**: Atomic match batches and history queries
//! - **player_archive**: Append-only player snapshots and the leaderboard
//!
//! # Connection Management
//!
//! A single rusqlite connection is wrapped in `Arc<Mutex<Connection>>` and every
//! operation runs inside `tokio::task::spawn_blocking`. The mutex also serializes
//! writers, which matches SQLite's single-writer model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::traits::{MatchStore, PlayerArchive, Storage};
use crate::types::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, PersistOutcome, PlayerSnapshot,
    PlayerStats, RoundRecord,
};

mod match_store;
mod player_archive;
mod schema;

/// SQLite storage backend
///
/// # Examples
///
/// ```no_run
/// use matchlog_storage::backends::sqlite::SqliteStorage;
/// use matchlog_storage::Storage;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // In-memory database for testing
/// let storage = SqliteStorage::new(":memory:").await?;
/// storage.initialize().await?;
///
/// // File-based database for production
/// let storage = SqliteStorage::new("/var/lib/matchlog/matches.sqlite").await?;
/// storage.initialize().await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteStorage {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteStorage {
    /// Open a SQLite database
    ///
    /// * `path` - Database path or `:memory:` for an in-memory database
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the database cannot be opened or
    /// the connection pragmas cannot be applied.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        Self::open(path.to_string(), None).await
    }

    /// Open the database named by a parsed configuration
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::open(
            config.connection_string.clone(),
            config.busy_timeout_ms.map(Duration::from_millis),
        )
        .await
    }

    async fn open(path: String, busy_timeout: Option<Duration>) -> Result<Self, StorageError> {
        let conn = tokio::task::spawn_blocking(move || {
            let conn = if path == ":memory:" {
                rusqlite::Connection::open_in_memory()
            } else {
                rusqlite::Connection::open(&path)
            }
            .map_err(|e| StorageError::connection("failed to open SQLite database", e))?;

            // journal_mode answers with a row, so it cannot go through execute
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
                .map_err(|e| StorageError::connection("failed to set journal_mode", e))?;
            conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
                .map_err(|e| StorageError::connection("failed to set connection pragmas", e))?;

            if let Some(timeout) = busy_timeout {
                conn.busy_timeout(timeout)
                    .map_err(|e| StorageError::connection("failed to set busy timeout", e))?;
            }

            Ok::<_, StorageError>(conn)
        })
        .await
        .map_err(|e| StorageError::connection("failed to spawn blocking task", e))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Connection handle for the sub-modules' spawn_blocking closures
    fn conn(&self) -> Arc<Mutex<rusqlite::Connection>> {
        Arc::clone(&self.conn)
    }
}

#[async_trait]
impl MatchStore for SqliteStorage {
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
impl PlayerArchive for SqliteStorage {
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
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<(), StorageError> {
        schema::initialize_schema(self).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();

            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| StorageError::connection("health check: query failed", e))?;

            let table_exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'matches'",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| StorageError::connection("health check: failed to verify schema", e))?;

            if !table_exists {
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
        // The connection closes on drop; flush the WAL so the file is self-contained
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .map_err(|e| StorageError::connection("failed to checkpoint WAL", e))
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during close", e))?
    }
}
