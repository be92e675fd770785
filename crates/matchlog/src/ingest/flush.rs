//! Match flush coordination
//!
//! All producers share one [`FlushCoordinator`]. Flushes are serialized by an
//! async mutex so the duplicate check, the stats reads and the batch write of
//! one match never interleave with another. Every attempt is bounded by the
//! configured timeout; a match whose attempt fails or times out is kept in the
//! retry queue as a whole and written again by [`FlushCoordinator::retry_pending`].

use chrono::{DateTime, Utc};
use matchlog_storage::{
    MatchBatch, MatchId, PersistOutcome, PlayerSnapshot, PlayerStats, Storage, StorageError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::context::{MatchTally, ReconciledMatch};
use super::rating::{rate, RatingConfig};
use crate::metrics::counters;

#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// The match and one snapshot per tallied player were committed
    Persisted {
        match_id: MatchId,
        players: Vec<PlayerStats>,
    },
    /// The match was already stored; nothing was written
    Duplicate { existing: MatchId },
}

#[derive(Debug, Error)]
pub enum FlushFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum FlushError {
    /// The match is queued and will be written by the next retry
    #[error("flush of match {match_id} failed, queued for retry: {source}")]
    Retryable {
        match_id: MatchId,
        #[source]
        source: FlushFailure,
    },

    /// The store failed its health check; the queue was left untouched
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] FlushFailure),
}

/// Result of draining the retry queue once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub persisted: usize,
    pub duplicates: usize,
    pub still_pending: usize,
}

struct Inner {
    storage: Arc<dyn Storage>,
    /// Serializes flushes; never held across anything but a bounded attempt
    flush_lock: tokio::sync::Mutex<()>,
    pending: Mutex<VecDeque<ReconciledMatch>>,
    rating: RatingConfig,
    timeout: Duration,
}

/// Shared write path from reconciled matches to the store
#[derive(Clone)]
pub struct FlushCoordinator {
    inner: Arc<Inner>,
}

impl FlushCoordinator {
    pub fn new(storage: Arc<dyn Storage>, rating: RatingConfig, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                flush_lock: tokio::sync::Mutex::new(()),
                pending: Mutex::new(VecDeque::new()),
                rating,
                timeout,
            }),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    pub fn rating(&self) -> &RatingConfig {
        &self.inner.rating
    }

    /// Number of matches waiting for a retry
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Ids of the matches waiting for a retry, oldest first
    pub fn pending_ids(&self) -> Vec<MatchId> {
        self.inner
            .pending
            .lock()
            .iter()
            .map(|m| m.record.id)
            .collect()
    }

    /// Rate and persist one reconciled match
    ///
    /// On failure the match is queued for [`Self::retry_pending`] and
    /// `FlushError::Retryable` is returned.
    pub async fn flush(&self, reconciled: ReconciledMatch) -> Result<FlushOutcome, FlushError> {
        let _guard = self.inner.flush_lock.lock().await;
        self.flush_locked(reconciled).await
    }

    /// Attempt every queued match again, in the order they were queued
    ///
    /// Matches that fail again go back on the queue. Returns
    /// `FlushError::Unavailable` without touching the queue when the store
    /// fails its health check.
    pub async fn retry_pending(&self) -> Result<RetrySummary, FlushError> {
        let _guard = self.inner.flush_lock.lock().await;

        match tokio::time::timeout(self.inner.timeout, self.inner.storage.health_check()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(FlushError::Unavailable(FlushFailure::Storage(e))),
            Err(_) => {
                return Err(FlushError::Unavailable(FlushFailure::Timeout(
                    self.inner.timeout,
                )))
            }
        }

        let queued: Vec<ReconciledMatch> = self.inner.pending.lock().drain(..).collect();
        debug!(count = queued.len(), "retrying pending flushes");

        let mut summary = RetrySummary::default();
        for reconciled in queued {
            match self.flush_locked(reconciled).await {
                Ok(FlushOutcome::Persisted { .. }) => summary.persisted += 1,
                Ok(FlushOutcome::Duplicate { .. }) => summary.duplicates += 1,
                // Already queued again
                Err(_) => {}
            }
        }
        summary.still_pending = self.pending_len();
        counters::set_pending_flushes(summary.still_pending);
        Ok(summary)
    }

    async fn flush_locked(&self, reconciled: ReconciledMatch) -> Result<FlushOutcome, FlushError> {
        let started = Instant::now();
        let match_id = reconciled.record.id;
        let timeout = self.inner.timeout;

        let result = match tokio::time::timeout(timeout, self.attempt(&reconciled)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(FlushFailure::Storage(e)),
            Err(_) => Err(FlushFailure::Timeout(timeout)),
        };

        match result {
            Ok(outcome) => {
                match &outcome {
                    FlushOutcome::Persisted { players, .. } => {
                        counters::record_flush("persisted", started.elapsed());
                        info!(
                            match_id = %match_id,
                            map = %reconciled.record.map,
                            rounds = reconciled.rounds.len(),
                            events = reconciled.events.len(),
                            players = players.len(),
                            "match persisted"
                        );
                    }
                    FlushOutcome::Duplicate { existing } => {
                        counters::record_flush("duplicate", started.elapsed());
                        info!(
                            match_id = %match_id,
                            existing = %existing,
                            map = %reconciled.record.map,
                            "match already stored, skipped"
                        );
                    }
                }
                Ok(outcome)
            }
            Err(source) => {
                let (status, transient) = match &source {
                    FlushFailure::Storage(e) => ("failed", e.is_transient()),
                    FlushFailure::Timeout(_) => ("timeout", true),
                };
                counters::record_flush(status, started.elapsed());
                warn!(
                    match_id = %match_id,
                    error = %source,
                    transient,
                    "flush failed, queued for retry"
                );

                let pending = {
                    let mut queue = self.inner.pending.lock();
                    queue.push_back(reconciled);
                    queue.len()
                };
                counters::set_pending_flushes(pending);

                Err(FlushError::Retryable { match_id, source })
            }
        }
    }

    async fn attempt(&self, reconciled: &ReconciledMatch) -> Result<FlushOutcome, StorageError> {
        let storage = &self.inner.storage;
        let record = &reconciled.record;

        if let Some(existing) = storage.find_duplicate(record.ended_at, &record.map).await? {
            return Ok(FlushOutcome::Duplicate { existing });
        }

        let mut snapshots = Vec::with_capacity(reconciled.tallies.len());
        let mut backfilled = 0usize;
        for tally in reconciled.tallies.values() {
            let latest = storage.latest_snapshot(&tally.player_id).await?;
            let recorded_at = snapshot_time(record.ended_at, latest.as_ref());
            if recorded_at != record.ended_at {
                backfilled += 1;
            }
            snapshots.push(PlayerSnapshot {
                match_id: record.id,
                recorded_at,
                stats: accumulate(latest.map(|s| s.stats), tally, &self.inner.rating),
            });
        }
        if backfilled > 0 {
            warn!(
                match_id = %record.id,
                map = %record.map,
                ended_at = %record.ended_at,
                players = backfilled,
                "match ended before already archived snapshots, folded into current stats"
            );
            counters::record_backfill(backfilled);
        }
        let players = snapshots.iter().map(|s| s.stats.clone()).collect();

        let batch = MatchBatch {
            record: record.clone(),
            rounds: reconciled.rounds.clone(),
            events: reconciled.events.clone(),
            accolades: reconciled.accolades.clone(),
            snapshots,
        };

        match storage.persist_match(batch).await? {
            PersistOutcome::Inserted(match_id) => Ok(FlushOutcome::Persisted { match_id, players }),
            PersistOutcome::Duplicate(existing) => Ok(FlushOutcome::Duplicate { existing }),
        }
    }
}

/// When a snapshot is archived
///
/// A match older than the player's newest snapshot is stamped with that
/// snapshot's time so the folded stats stay current; `matches_played`
/// orders the tie.
pub fn snapshot_time(ended_at: DateTime<Utc>, latest: Option<&PlayerSnapshot>) -> DateTime<Utc> {
    match latest {
        Some(latest) if latest.recorded_at > ended_at => latest.recorded_at,
        _ => ended_at,
    }
}

/// Fold one match tally into a player's running stats
pub fn accumulate(
    previous: Option<PlayerStats>,
    tally: &MatchTally,
    config: &RatingConfig,
) -> PlayerStats {
    let mut stats = previous.unwrap_or_else(|| {
        PlayerStats::new(&tally.player_id, &tally.display_name, config.initial_rating)
    });

    stats.rating = rate(stats.rating, tally, config);
    stats.display_name = tally.display_name.clone();
    stats.kills = stats.kills.saturating_add(tally.kills);
    stats.deaths = stats.deaths.saturating_add(tally.deaths);
    stats.assists = stats.assists.saturating_add(tally.assists);
    stats.headshot_kills = stats.headshot_kills.saturating_add(tally.headshot_kills);
    stats.rounds_played = stats.rounds_played.saturating_add(tally.rounds_played);
    stats.clutches_won = stats.clutches_won.saturating_add(tally.clutches_won);
    stats.damage_dealt = stats.damage_dealt.saturating_add(tally.damage_dealt);
    stats.matches_played = stats.matches_played.saturating_add(1);
    stats
}
