//! Match store implementation for SQLite
//!
//! A batch is written inside one transaction. The duplicate check runs inside
//! the same transaction, and a UNIQUE violation on the match row (another
//! process won the race) is reported as a duplicate rather than an error.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::SqliteStorage;
use crate::backends::rows::{
    encode_participants, encode_payload, side_to_sql, to_micros, AccoladeRow, EventRow, MatchRow,
    RoundRow,
};
use crate::backends::sql;
use crate::error::StorageError;
use crate::types::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, PersistOutcome, RoundRecord,
};

fn read_match(row: &Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        match_id: row.get(0)?,
        source: row.get(1)?,
        map: row.get(2)?,
        mode: row.get(3)?,
        team1_score: row.get(4)?,
        team2_score: row.get(5)?,
        duration_minutes: row.get(6)?,
        ended_at: row.get(7)?,
        round_count: row.get(8)?,
        anomaly_count: row.get(9)?,
        ingested_at: row.get(10)?,
    })
}

fn read_round(row: &Row<'_>) -> rusqlite::Result<RoundRow> {
    Ok(RoundRow {
        round_id: row.get(0)?,
        match_id: row.get(1)?,
        round_number: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        winner: row.get(5)?,
        reason: row.get(6)?,
        participants: row.get(7)?,
    })
}

fn read_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        event_id: row.get(0)?,
        match_id: row.get(1)?,
        round_id: row.get(2)?,
        sequence: row.get(3)?,
        event_timestamp: row.get(4)?,
        payload: row.get(5)?,
        orphan: row.get(6)?,
    })
}

fn read_accolade(row: &Row<'_>) -> rusqlite::Result<AccoladeRow> {
    Ok(AccoladeRow {
        accolade_id: row.get(0)?,
        match_id: row.get(1)?,
        award: row.get(2)?,
        player_name: row.get(3)?,
        player_id: row.get(4)?,
        value: row.get(5)?,
        position: row.get(6)?,
        score: row.get(7)?,
        awarded_at: row.get(8)?,
    })
}

fn find_duplicate(
    conn: &Connection,
    ended_at: DateTime<Utc>,
    map: &str,
) -> Result<Option<MatchId>, StorageError> {
    let existing: Option<String> = conn
        .query_row(
            sql::FIND_DUPLICATE,
            params![to_micros(ended_at), map],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StorageError::query("failed to check for duplicate match", e))?;

    existing
        .map(|id| {
            id.parse::<MatchId>()
                .map_err(|e| StorageError::InvalidData(format!("invalid match_id '{id}': {e}")))
        })
        .transpose()
}

/// Insert everything but the match row; the caller owns the transaction
fn insert_children(conn: &Connection, batch: &MatchBatch) -> Result<(), StorageError> {
    let match_id = batch.record.id.to_string();

    let mut stmt = conn
        .prepare(sql::INSERT_ROUND)
        .map_err(|e| StorageError::query("failed to prepare round insert", e))?;
    for round in &batch.rounds {
        stmt.execute(params![
            round.id.to_string(),
            match_id,
            i64::from(round.number),
            round.started_at.map(to_micros),
            round.ended_at.map(to_micros),
            side_to_sql(round.winner),
            round.reason,
            encode_participants(&round.participants)?,
        ])
        .map_err(|e| StorageError::query(format!("failed to insert round {}", round.number), e))?;
    }

    let mut stmt = conn
        .prepare(sql::INSERT_EVENT)
        .map_err(|e| StorageError::query("failed to prepare event insert", e))?;
    for event in &batch.events {
        stmt.execute(params![
            event.id.to_string(),
            match_id,
            event.round_id.map(|id| id.to_string()),
            i64::from(event.sequence),
            event.kind.event_type(),
            to_micros(event.timestamp),
            encode_payload(&event.kind)?,
            event.orphan,
        ])
        .map_err(|e| {
            StorageError::query(format!("failed to insert event {}", event.sequence), e)
        })?;
    }

    let mut stmt = conn
        .prepare(sql::INSERT_ACCOLADE)
        .map_err(|e| StorageError::query("failed to prepare accolade insert", e))?;
    for accolade in &batch.accolades {
        stmt.execute(params![
            accolade.id.to_string(),
            match_id,
            accolade.award,
            accolade.player_name,
            accolade.player_id,
            accolade.value,
            i64::from(accolade.position),
            accolade.score,
            to_micros(accolade.awarded_at),
        ])
        .map_err(|e| StorageError::query("failed to insert accolade", e))?;
    }

    for snapshot in &batch.snapshots {
        super::player_archive::insert_snapshot(conn, snapshot)?;
    }

    Ok(())
}

impl SqliteStorage {
    pub(super) async fn persist_match_impl(
        &self,
        batch: MatchBatch,
    ) -> Result<PersistOutcome, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let record = &batch.record;

            // Write lock up front so another connection's batch waits on busy_timeout
            let tx = guard
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| StorageError::query("failed to begin transaction", e))?;

            if let Some(existing) = find_duplicate(&tx, record.ended_at, &record.map)? {
                return Ok(PersistOutcome::Duplicate(existing));
            }

            let inserted = tx.execute(
                sql::INSERT_MATCH,
                params![
                    record.id.to_string(),
                    record.source,
                    record.map,
                    record.mode,
                    i64::from(record.team1_score),
                    i64::from(record.team2_score),
                    i64::from(record.duration_minutes),
                    to_micros(record.ended_at),
                    i64::from(record.round_count),
                    i64::from(record.anomaly_count),
                    to_micros(record.ingested_at),
                ],
            );

            if let Err(e) = inserted {
                if sql::is_unique_violation(&e.to_string()) {
                    drop(tx);
                    if let Some(existing) = find_duplicate(&guard, record.ended_at, &record.map)? {
                        return Ok(PersistOutcome::Duplicate(existing));
                    }
                }
                return Err(StorageError::query("failed to insert match", e));
            }

            // Dropping tx on error rolls the batch back
            insert_children(&tx, &batch)?;

            tx.commit()
                .map_err(|e| StorageError::query("failed to commit match batch", e))?;

            Ok(PersistOutcome::Inserted(record.id))
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during persist_match", e))?
    }

    pub(super) async fn find_duplicate_impl(
        &self,
        ended_at: DateTime<Utc>,
        map: &str,
    ) -> Result<Option<MatchId>, StorageError> {
        let conn = self.conn();
        let map = map.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            find_duplicate(&conn, ended_at, &map)
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during find_duplicate", e))?
    }

    pub(super) async fn get_match_impl(&self, id: MatchId) -> Result<MatchRecord, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let row = conn
                .query_row(&sql::select_match(), params![id.to_string()], read_match)
                .optional()
                .map_err(|e| StorageError::query("failed to load match", e))?;

            row.ok_or(StorageError::MatchNotFound(id))?
            .into_record()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during get_match", e))?
    }

    pub(super) async fn list_matches_impl(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<MatchRecord>, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(&sql::list_matches(limit))
                .map_err(|e| StorageError::query("failed to prepare match listing", e))?;

            let rows = stmt
                .query_map([], read_match)
                .map_err(|e| StorageError::query("failed to list matches", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::query("failed to read match row", e))?;

            rows.into_iter().map(MatchRow::into_record).collect()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during list_matches", e))?
    }

    pub(super) async fn load_rounds_impl(
        &self,
        id: MatchId,
    ) -> Result<Vec<RoundRecord>, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(sql::SELECT_ROUNDS)
                .map_err(|e| StorageError::query("failed to prepare round query", e))?;

            let rows = stmt
                .query_map(params![id.to_string()], read_round)
                .map_err(|e| StorageError::query("failed to load rounds", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::query("failed to read round row", e))?;

            rows.into_iter().map(RoundRow::into_record).collect()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during load_rounds", e))?
    }

    pub(super) async fn load_events_impl(
        &self,
        id: MatchId,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(sql::SELECT_EVENTS)
                .map_err(|e| StorageError::query("failed to prepare event query", e))?;

            let rows = stmt
                .query_map(params![id.to_string()], read_event)
                .map_err(|e| StorageError::query("failed to load events", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::query("failed to read event row", e))?;

            rows.into_iter().map(EventRow::into_record).collect()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during load_events", e))?
    }

    pub(super) async fn load_accolades_impl(
        &self,
        id: MatchId,
    ) -> Result<Vec<AccoladeRecord>, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(sql::SELECT_ACCOLADES)
                .map_err(|e| StorageError::query("failed to prepare accolade query", e))?;

            let rows = stmt
                .query_map(params![id.to_string()], read_accolade)
                .map_err(|e| StorageError::query("failed to load accolades", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::query("failed to read accolade row", e))?;

            rows.into_iter().map(AccoladeRow::into_record).collect()
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during load_accolades", e))?
    }

    pub(super) async fn count_matches_impl(&self) -> Result<i64, StorageError> {
        let conn = self.conn();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.query_row(sql::COUNT_MATCHES, [], |row| row.get(0))
                .map_err(|e| StorageError::query("failed to count matches", e))
        })
        .await
        .map_err(|e| StorageError::connection("spawn_blocking panicked during count_matches", e))?
    }
}

