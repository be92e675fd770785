//! Player archive implementation for DuckDB

use duckdb::{params, Connection, Row};

use super::{optional, DuckDbStorage};
use crate::backends::rows::{to_micros, u64_to_sql, SnapshotRow};
use crate::backends::sql;
use crate::error::StorageError;
use crate::types::{PlayerSnapshot, PlayerStats};

fn read_snapshot(row: &Row<'_>) -> duckdb::Result<SnapshotRow> {
    Ok(SnapshotRow {
        player_id: row.get(0)?,
        match_id: row.get(1)?,
        recorded_at: row.get(2)?,
        display_name: row.get(3)?,
        kills: row.get(4)?,
        deaths: row.get(5)?,
        assists: row.get(6)?,
        headshot_kills: row.get(7)?,
        rounds_played: row.get(8)?,
        clutches_won: row.get(9)?,
        damage_dealt: row.get(10)?,
        matches_played: row.get(11)?,
        rating: row.get(12)?,
    })
}

/// Append one snapshot on an open connection or transaction
pub(super) fn insert_snapshot(
    conn: &Connection,
    snapshot: &PlayerSnapshot,
) -> Result<(), StorageError> {
    let stats = &snapshot.stats;
    let match_id = snapshot.match_id.to_string();

    let exists: bool = conn
        .query_row(
            sql::SNAPSHOT_EXISTS,
            params![stats.player_id, match_id],
            |row| row.get::<_, i64>(0).map(|n| n > 0),
        )
        .map_err(|e| StorageError::query("failed to check for existing snapshot", e))?;

    if exists {
        return Err(StorageError::DuplicateSnapshot {
            player_id: stats.player_id.clone(),
            match_id,
        });
    }

    conn.execute(
        sql::INSERT_SNAPSHOT,
        params![
            stats.player_id,
            match_id,
            to_micros(snapshot.recorded_at),
            stats.display_name,
            i64::from(stats.kills),
            i64::from(stats.deaths),
            i64::from(stats.assists),
            i64::from(stats.headshot_kills),
            i64::from(stats.rounds_played),
            i64::from(stats.clutches_won),
            u64_to_sql(stats.damage_dealt),
            i64::from(stats.matches_played),
            stats.rating,
        ],
    )
    .map_err(|e| StorageError::query(format!("failed to archive player {}", stats.player_id), e))?;

    Ok(())
}

impl DuckDbStorage {
    pub(super) async fn archive_player_snapshot_impl(
        &self,
        snapshot: PlayerSnapshot,
    ) -> Result<(), StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            insert_snapshot(&conn, &snapshot)
        })
        .await
        .map_err(|e| {
            StorageError::connection("spawn_blocking panicked during archive_player_snapshot", e)
        })?
    }

    pub(super) async fn latest_snapshot_impl(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerSnapshot>, StorageError> {
        let conn = self.conn();
        let player_id = player_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let row = optional(conn.query_row(
                &sql::current_stats(),
                params![player_id],
                read_snapshot,
            ))
                .map_err(|e| StorageError::query("failed to load current stats", e))?;

            row.map(SnapshotRow::into_snapshot).transpose()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during latest_snapshot", e))?
    }

    pub(super) async fn player_history_impl(
        &self,
        player_id: &str,
    ) -> Result<Vec<PlayerSnapshot>, StorageError> {
        let conn = self.conn();
        let player_id = player_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(&sql::player_history())
                .map_err(|e| StorageError::query("failed to prepare history query", e))?;

            let rows = stmt
                .query_map(params![player_id], read_snapshot)
                .map_err(|e| StorageError::query("failed to load player history", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::query("failed to read snapshot row", e))?;

            rows.into_iter().map(SnapshotRow::into_snapshot).collect()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during player_history", e))?
    }

    pub(super) async fn leaderboard_impl(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<PlayerStats>, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(&sql::leaderboard(limit))
                .map_err(|e| StorageError::query("failed to prepare leaderboard query", e))?;

            let rows = stmt
                .query_map([], read_snapshot)
                .map_err(|e| StorageError::query("failed to load leaderboard", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::query("failed to read snapshot row", e))?;

            rows.into_iter()
                .map(|r| r.into_snapshot().map(|s| s.stats))
                .collect()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during leaderboard", e))?
    }
}
