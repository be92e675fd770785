//! Store double that fails on demand

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matchlog_storage::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, MatchStore, PersistOutcome,
    PlayerArchive, PlayerSnapshot, PlayerStats, RoundRecord, Storage, StorageError,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delegates to a real store; `persist_match` fails while failures are armed
pub struct FailingStore {
    inner: Arc<dyn Storage>,
    failures_left: AtomicUsize,
    persist_delay_ms: AtomicU64,
    healthy: AtomicBool,
    persist_calls: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(0),
            persist_delay_ms: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            persist_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` persist calls
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Stall every persist call before delegating
    pub fn delay_persist(&self, delay: Duration) {
        self.persist_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    fn injected(what: &str) -> StorageError {
        StorageError::connection(
            format!("injected {what} failure"),
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
        )
    }
}

#[async_trait]
impl MatchStore for FailingStore {
    async fn persist_match(&self, batch: MatchBatch) -> Result<PersistOutcome, StorageError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.persist_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let armed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(Self::injected("persist"));
        }
        self.inner.persist_match(batch).await
    }

    async fn find_duplicate(
        &self,
        ended_at: DateTime<Utc>,
        map: &str,
    ) -> Result<Option<MatchId>, StorageError> {
        self.inner.find_duplicate(ended_at, map).await
    }

    async fn get_match(&self, id: MatchId) -> Result<MatchRecord, StorageError> {
        self.inner.get_match(id).await
    }

    async fn list_matches(&self, limit: Option<u32>) -> Result<Vec<MatchRecord>, StorageError> {
        self.inner.list_matches(limit).await
    }

    async fn load_rounds(&self, id: MatchId) -> Result<Vec<RoundRecord>, StorageError> {
        self.inner.load_rounds(id).await
    }

    async fn load_events(&self, id: MatchId) -> Result<Vec<EventRecord>, StorageError> {
        self.inner.load_events(id).await
    }

    async fn load_accolades(&self, id: MatchId) -> Result<Vec<AccoladeRecord>, StorageError> {
        self.inner.load_accolades(id).await
    }

    async fn count_matches(&self) -> Result<i64, StorageError> {
        self.inner.count_matches().await
    }
}

#[async_trait]
impl PlayerArchive for FailingStore {
    async fn archive_player_snapshot(&self, snapshot: PlayerSnapshot) -> Result<(), StorageError> {
        self.inner.archive_player_snapshot(snapshot).await
    }

    async fn latest_snapshot(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerSnapshot>, StorageError> {
        self.inner.latest_snapshot(player_id).await
    }

    async fn player_history(
        &self,
        player_id: &str,
    ) -> Result<Vec<PlayerSnapshot>, StorageError> {
        self.inner.player_history(player_id).await
    }

    async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<PlayerStats>, StorageError> {
        self.inner.leaderboard(limit).await
    }
}

#[async_trait]
impl Storage for FailingStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        self.inner.initialize().await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Self::injected("health check"));
        }
        self.inner.health_check().await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.inner.close().await
    }
}
