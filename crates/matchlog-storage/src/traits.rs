//! Storage trait definitions
//!
//! - MatchStore: atomic match batches and match history queries
//! - PlayerArchive: append-only per-player stat snapshots
//! - Storage: Combined interface with lifecycle management

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::types::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, PersistOutcome, PlayerSnapshot,
    PlayerStats, RoundRecord,
};

/// Match write side and history queries
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Persist a reconciled match atomically
    ///
    /// The match row, its rounds, events, accolades and the player snapshots
    /// in the batch are written in a single transaction. If any insert fails,
    /// nothing is written.
    ///
    /// When a match with the same `ended_at` and `map` already exists the call
    /// writes nothing and returns [`PersistOutcome::Duplicate`].
    ///
    /// # Errors
    /// * `StorageError::Query` - Database error (transaction rolled back)
    async fn persist_match(&self, batch: MatchBatch) -> Result<PersistOutcome, StorageError>;

    /// Find an existing match by its dedup key
    ///
    /// # Errors
    /// * `StorageError::Query` - Database error
    async fn find_duplicate(
        &self,
        ended_at: DateTime<Utc>,
        map: &str,
    ) -> Result<Option<MatchId>, StorageError>;

    /// Get a match by ID
    ///
    /// # Errors
    /// * `StorageError::MatchNotFound` - Match doesn't exist
    /// * `StorageError::Query` - Database error
    async fn get_match(&self, id: MatchId) -> Result<MatchRecord, StorageError>;

    /// List matches, newest `ended_at` first
    ///
    /// # Errors
    /// * `StorageError::Query` - Database error
    async fn list_matches(&self, limit: Option<u32>) -> Result<Vec<MatchRecord>, StorageError>;

    /// Rounds of a match ordered by round number
    async fn load_rounds(&self, id: MatchId) -> Result<Vec<RoundRecord>, StorageError>;

    /// Events of a match in arrival order
    async fn load_events(&self, id: MatchId) -> Result<Vec<EventRecord>, StorageError>;

    /// Accolades of a match ordered by award then position
    async fn load_accolades(&self, id: MatchId) -> Result<Vec<AccoladeRecord>, StorageError>;

    /// Count stored matches
    async fn count_matches(&self) -> Result<i64, StorageError>;
}

/// Historical player stats
///
/// Snapshots are append-only. The current view of a player is the snapshot
/// with the newest `recorded_at`.
#[async_trait]
pub trait PlayerArchive: Send + Sync {
    /// Append one snapshot outside of a match batch
    ///
    /// # Errors
    /// * `StorageError::DuplicateSnapshot` - Player already archived for that match
    /// * `StorageError::Query` - Database error
    async fn archive_player_snapshot(&self, snapshot: PlayerSnapshot) -> Result<(), StorageError>;

    /// Newest snapshot of a player, `None` if never archived
    async fn latest_snapshot(&self, player_id: &str)
        -> Result<Option<PlayerSnapshot>, StorageError>;

    /// Current stats of a player, `None` if never archived
    async fn current_stats(&self, player_id: &str) -> Result<Option<PlayerStats>, StorageError> {
        Ok(self.latest_snapshot(player_id).await?.map(|s| s.stats))
    }

    /// Every snapshot of a player, oldest first
    async fn player_history(&self, player_id: &str)
        -> Result<Vec<PlayerSnapshot>, StorageError>;

    /// Current stats of all players ordered by rating, highest first
    async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<PlayerStats>, StorageError>;
}

/// Combined storage interface with lifecycle management
#[async_trait]
pub trait Storage: MatchStore + PlayerArchive {
    /// Initialize storage (schema setup)
    ///
    /// Must be called before any other operations. Idempotent - safe to
    /// call multiple times.
    ///
    /// # Errors
    /// * `StorageError::Migration` - Schema setup failed
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Check storage health and connectivity
    ///
    /// # Errors
    /// * `StorageError::Connection` - Backend unreachable
    async fn health_check(&self) -> Result<(), StorageError>;

    /// Close storage connections and clean up resources
    async fn close(&self) -> Result<(), StorageError>;
}
