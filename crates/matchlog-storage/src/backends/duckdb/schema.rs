//! Database schema definitions for DuckDB
//!
//! Same tables and columns as the SQLite backend so the shared queries run
//! unchanged. Foreign keys are left out; DuckDB cannot update rows that are
//! referenced by one.

use crate::backends::duckdb::DuckDbStorage;
use crate::error::StorageError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS matches (
        match_id VARCHAR PRIMARY KEY,
        source VARCHAR NOT NULL,
        map VARCHAR NOT NULL,
        mode VARCHAR NOT NULL,
        team1_score BIGINT NOT NULL,
        team2_score BIGINT NOT NULL,
        duration_minutes BIGINT NOT NULL,
        ended_at BIGINT NOT NULL,
        round_count BIGINT NOT NULL,
        anomaly_count BIGINT NOT NULL,
        ingested_at BIGINT NOT NULL,
        UNIQUE(ended_at, map)
    );

    CREATE TABLE IF NOT EXISTS rounds (
        round_id VARCHAR PRIMARY KEY,
        match_id VARCHAR NOT NULL,
        round_number BIGINT NOT NULL,
        started_at BIGINT,
        ended_at BIGINT,
        winner VARCHAR,
        reason VARCHAR,
        participants VARCHAR NOT NULL,
        UNIQUE(match_id, round_number)
    );

    CREATE TABLE IF NOT EXISTS match_events (
        event_id VARCHAR PRIMARY KEY,
        match_id VARCHAR NOT NULL,
        round_id VARCHAR,
        sequence BIGINT NOT NULL,
        event_type VARCHAR NOT NULL,
        event_timestamp BIGINT NOT NULL,
        payload VARCHAR NOT NULL,
        orphan BOOLEAN NOT NULL DEFAULT false,
        UNIQUE(match_id, sequence)
    );

    CREATE INDEX IF NOT EXISTS idx_events_type ON match_events(match_id, event_type);

    CREATE TABLE IF NOT EXISTS accolades (
        accolade_id VARCHAR PRIMARY KEY,
        match_id VARCHAR NOT NULL,
        award VARCHAR NOT NULL,
        player_name VARCHAR NOT NULL,
        player_id VARCHAR,
        value DOUBLE NOT NULL,
        position BIGINT NOT NULL,
        score DOUBLE NOT NULL,
        awarded_at BIGINT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS player_snapshots (
        player_id VARCHAR NOT NULL,
        match_id VARCHAR NOT NULL,
        recorded_at BIGINT NOT NULL,
        display_name VARCHAR NOT NULL,
        kills BIGINT NOT NULL,
        deaths BIGINT NOT NULL,
        assists BIGINT NOT NULL,
        headshot_kills BIGINT NOT NULL,
        rounds_played BIGINT NOT NULL,
        clutches_won BIGINT NOT NULL,
        damage_dealt BIGINT NOT NULL,
        matches_played BIGINT NOT NULL,
        rating DOUBLE NOT NULL,
        PRIMARY KEY (player_id, match_id)
    );
"#;

/// Initialize the DuckDB schema
///
/// # Errors
///
/// Returns `StorageError::Migration` if schema initialization fails.
pub async fn initialize_schema(storage: &DuckDbStorage) -> Result<(), StorageError> {
    let conn = storage.conn();

    tokio::task::spawn_blocking(move || {
        let conn = conn.lock();
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::migration("failed to create DuckDB schema", e))
    })
    .await
    .map_err(|e| StorageError::migration("spawn_blocking panicked during schema initialization", e))?
}
