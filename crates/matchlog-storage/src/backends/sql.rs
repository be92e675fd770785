//! Queries shared by every backend
//!
//! Only positional `?` parameters and ANSI window functions are used so the
//! same text runs on SQLite and DuckDB. Timestamps are stored as BIGINT
//! microseconds since the Unix epoch.
//!
//! Column lists here fix the indexes the backends read rows by.

pub const INSERT_MATCH: &str = r#"
    INSERT INTO matches (
        match_id, source, map, mode, team1_score, team2_score,
        duration_minutes, ended_at, round_count, anomaly_count, ingested_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const INSERT_ROUND: &str = r#"
    INSERT INTO rounds (
        round_id, match_id, round_number, started_at, ended_at,
        winner, reason, participants
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const INSERT_EVENT: &str = r#"
    INSERT INTO match_events (
        event_id, match_id, round_id, sequence, event_type,
        event_timestamp, payload, orphan
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const INSERT_ACCOLADE: &str = r#"
    INSERT INTO accolades (
        accolade_id, match_id, award, player_name, player_id,
        value, position, score, awarded_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const INSERT_SNAPSHOT: &str = r#"
    INSERT INTO player_snapshots (
        player_id, match_id, recorded_at, display_name, kills, deaths,
        assists, headshot_kills, rounds_played, clutches_won,
        damage_dealt, matches_played, rating
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const SNAPSHOT_EXISTS: &str =
    "SELECT COUNT(*) FROM player_snapshots WHERE player_id = ? AND match_id = ?";

pub const FIND_DUPLICATE: &str = "SELECT match_id FROM matches WHERE ended_at = ? AND map = ?";

const MATCH_COLUMNS: &str = "match_id, source, map, mode, team1_score, team2_score, \
     duration_minutes, ended_at, round_count, anomaly_count, ingested_at";

const SNAPSHOT_COLUMNS: &str = "player_id, match_id, recorded_at, display_name, kills, deaths, \
     assists, headshot_kills, rounds_played, clutches_won, damage_dealt, matches_played, rating";

pub fn select_match() -> String {
    format!("SELECT {MATCH_COLUMNS} FROM matches WHERE match_id = ?")
}

pub fn list_matches(limit: Option<u32>) -> String {
    format!(
        "SELECT {MATCH_COLUMNS} FROM matches ORDER BY ended_at DESC, match_id DESC{}",
        limit_clause(limit)
    )
}

pub const COUNT_MATCHES: &str = "SELECT COUNT(*) FROM matches";

pub const SELECT_ROUNDS: &str = r#"
    SELECT round_id, match_id, round_number, started_at, ended_at, winner, reason, participants
    FROM rounds
    WHERE match_id = ?
    ORDER BY round_number
"#;

pub const SELECT_EVENTS: &str = r#"
    SELECT event_id, match_id, round_id, sequence, event_timestamp, payload, orphan
    FROM match_events
    WHERE match_id = ?
    ORDER BY sequence
"#;

pub const SELECT_ACCOLADES: &str = r#"
    SELECT accolade_id, match_id, award, player_name, player_id, value, position, score, awarded_at
    FROM accolades
    WHERE match_id = ?
    ORDER BY award, position
"#;

// matches_played only grows, so it orders snapshots sharing a recorded_at
pub fn current_stats() -> String {
    format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM player_snapshots WHERE player_id = ? \
         ORDER BY recorded_at DESC, matches_played DESC LIMIT 1"
    )
}

pub fn player_history() -> String {
    format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM player_snapshots WHERE player_id = ? \
         ORDER BY recorded_at ASC, matches_played ASC"
    )
}

pub fn leaderboard(limit: Option<u32>) -> String {
    format!(
        r#"
        SELECT {SNAPSHOT_COLUMNS}
        FROM (
            SELECT *,
                ROW_NUMBER() OVER (
                    PARTITION BY player_id
                    ORDER BY recorded_at DESC, matches_played DESC
                ) AS rn
            FROM player_snapshots
        ) latest
        WHERE rn = 1
        ORDER BY rating DESC, player_id ASC{}
        "#,
        limit_clause(limit)
    )
}

fn limit_clause(limit: Option<u32>) -> String {
    limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default()
}

/// Whether a driver error message reports a uniqueness violation
pub fn is_unique_violation(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("unique") || lower.contains("primary key") || lower.contains("duplicate key")
}
