//! Database schema definitions for SQLite
//!
//! - `matches`: one row per finished match, unique on `(ended_at, map)`
//! - `rounds`, `match_events`, `accolades`: children of a match
//! - `player_snapshots`: append-only stats history, one row per player and match
//!
//! Timestamps are INTEGER microseconds. Event payloads are JSON text.

use super::SqliteStorage;
use crate::error::StorageError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS matches (
        match_id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        map TEXT NOT NULL,
        mode TEXT NOT NULL,
        team1_score INTEGER NOT NULL,
        team2_score INTEGER NOT NULL,
        duration_minutes INTEGER NOT NULL,
        ended_at INTEGER NOT NULL,
        round_count INTEGER NOT NULL,
        anomaly_count INTEGER NOT NULL,
        ingested_at INTEGER NOT NULL,
        UNIQUE(ended_at, map)
    );

    CREATE TABLE IF NOT EXISTS rounds (
        round_id TEXT PRIMARY KEY,
        match_id TEXT NOT NULL REFERENCES matches(match_id),
        round_number INTEGER NOT NULL,
        started_at INTEGER,
        ended_at INTEGER,
        winner TEXT,
        reason TEXT,
        participants TEXT NOT NULL,
        UNIQUE(match_id, round_number)
    );

    CREATE TABLE IF NOT EXISTS match_events (
        event_id TEXT PRIMARY KEY,
        match_id TEXT NOT NULL REFERENCES matches(match_id),
        round_id TEXT REFERENCES rounds(round_id),
        sequence INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        event_timestamp INTEGER NOT NULL,
        payload TEXT NOT NULL,
        orphan INTEGER NOT NULL DEFAULT 0,
        UNIQUE(match_id, sequence)
    );

    CREATE INDEX IF NOT EXISTS idx_events_type ON match_events(match_id, event_type);

    CREATE TABLE IF NOT EXISTS accolades (
        accolade_id TEXT PRIMARY KEY,
        match_id TEXT NOT NULL REFERENCES matches(match_id),
        award TEXT NOT NULL,
        player_name TEXT NOT NULL,
        player_id TEXT,
        value REAL NOT NULL,
        position INTEGER NOT NULL,
        score REAL NOT NULL,
        awarded_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_accolades_match ON accolades(match_id);

    CREATE TABLE IF NOT EXISTS player_snapshots (
        player_id TEXT NOT NULL,
        match_id TEXT NOT NULL,
        recorded_at INTEGER NOT NULL,
        display_name TEXT NOT NULL,
        kills INTEGER NOT NULL,
        deaths INTEGER NOT NULL,
        assists INTEGER NOT NULL,
        headshot_kills INTEGER NOT NULL,
        rounds_played INTEGER NOT NULL,
        clutches_won INTEGER NOT NULL,
        damage_dealt INTEGER NOT NULL,
        matches_played INTEGER NOT NULL,
        rating REAL NOT NULL,
        PRIMARY KEY (player_id, match_id)
    );

    CREATE INDEX IF NOT EXISTS idx_snapshots_recorded
        ON player_snapshots(player_id, recorded_at);
"#;

/// Create every table and index; safe to run repeatedly
pub async fn initialize_schema(storage: &SqliteStorage) -> Result<(), StorageError> {
    let conn = storage.conn();

    tokio::task::spawn_blocking(move || {
        let conn = conn.lock();
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::migration("failed to create SQLite schema", e))
    })
    .await
    .map_err(|e| StorageError::migration("spawn_blocking panicked during schema initialization", e))?
}
