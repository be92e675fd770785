//! Shared test harness for storage backends
//!
//! Generic test functions that every backend must pass. Suites share one
//! storage instance, so each test writes rows under its own unique map name
//! and player ids and never assumes an empty database.
//!
//! # Usage
//!
//! ```ignore
//! use matchlog_storage::backends::sqlite::SqliteStorage;
//!
//! #[tokio::test]
//! async fn sqlite_passes_all_tests() {
//!     let storage = SqliteStorage::new(":memory:").await.unwrap();
//!     storage.initialize().await.unwrap();
//!     common::run_all_tests(&storage).await;
//! }
//! ```

#![allow(dead_code)]

pub mod match_store_tests;
pub mod player_archive_tests;

use chrono::{DateTime, Duration, TimeZone, Utc};
use matchlog_common::{EventKind, PlayerRef, Side};
use matchlog_storage::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, PlayerSnapshot, PlayerStats,
    RoundId, RoundRecord, Storage,
};
use ulid::Ulid;

/// Run all storage trait tests
pub async fn run_all_tests<S: Storage>(storage: &S) {
    println!("Running MatchStore tests...");
    match_store_tests::run_all(storage).await;

    println!("Running PlayerArchive tests...");
    player_archive_tests::run_all(storage).await;

    println!("All storage tests passed!");
}

/// Run only MatchStore trait tests
pub async fn run_match_store_tests<S: Storage>(storage: &S) {
    match_store_tests::run_all(storage).await;
}

/// Run only PlayerArchive trait tests
pub async fn run_player_archive_tests<S: Storage>(storage: &S) {
    player_archive_tests::run_all(storage).await;
}

/// A map name no other test uses
pub fn unique_map(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Whole-second timestamp, the resolution of log lines
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .expect("valid timestamp")
}

pub fn player(name: &str, id: &str, side: Side) -> PlayerRef {
    PlayerRef {
        name: name.to_string(),
        slot: 2,
        id: id.to_string(),
        side: Some(side),
    }
}

pub fn stats(player_id: &str, name: &str, rating: f64, matches_played: u32) -> PlayerStats {
    let mut stats = PlayerStats::new(player_id, name, rating);
    stats.kills = 10 * matches_played;
    stats.deaths = 5 * matches_played;
    stats.rounds_played = 20 * matches_played;
    stats.damage_dealt = 1500 * u64::from(matches_played);
    stats.matches_played = matches_played;
    stats
}

/// A two-round match with one kill per round, an orphan event and an accolade
pub fn sample_batch(map: &str, ended_at: DateTime<Utc>) -> MatchBatch {
    let match_id = MatchId::new();
    let alice = player("Alice", "[U:1:1001]", Side::Ct);
    let bob = player("Bob", "[U:1:1002]", Side::Terrorist);
    let participants = vec!["[U:1:1001]".to_string(), "[U:1:1002]".to_string()];

    let rounds: Vec<RoundRecord> = (1..=2u32)
        .map(|n| RoundRecord {
            id: RoundId::new(),
            match_id,
            number: n,
            started_at: Some(ended_at - Duration::minutes(10) + Duration::minutes(i64::from(n))),
            ended_at: Some(ended_at - Duration::minutes(9) + Duration::minutes(i64::from(n))),
            winner: Some(if n == 1 { Side::Ct } else { Side::Terrorist }),
            reason: Some("TargetBombed".to_string()),
            participants: participants.clone(),
        })
        .collect();

    let mut events: Vec<EventRecord> = rounds
        .iter()
        .enumerate()
        .map(|(i, round)| EventRecord {
            id: Ulid::new(),
            match_id,
            round_id: Some(round.id),
            sequence: i as u32,
            timestamp: round.started_at.expect("started") + Duration::seconds(30),
            kind: EventKind::Kill {
                attacker: alice.clone(),
                victim: bob.clone(),
                weapon: "ak47".to_string(),
                headshot: i == 0,
                modifiers: Vec::new(),
            },
            orphan: false,
        })
        .collect();

    events.push(EventRecord {
        id: Ulid::new(),
        match_id,
        round_id: None,
        sequence: events.len() as u32,
        timestamp: ended_at - Duration::seconds(5),
        kind: EventKind::Attack {
            attacker: bob.clone(),
            victim: alice.clone(),
            weapon: "glock".to_string(),
            damage: 12,
            armor_damage: 3,
            health: 88,
            armor: 97,
            hitgroup: "chest".to_string(),
        },
        orphan: true,
    });

    let accolades = vec![AccoladeRecord {
        id: Ulid::new(),
        match_id,
        award: "kills".to_string(),
        player_name: "Alice".to_string(),
        player_id: Some("[U:1:1001]".to_string()),
        value: 2.0,
        position: 0,
        score: 40.0,
        awarded_at: ended_at,
    }];

    let record = MatchRecord {
        id: match_id,
        source: "test-server".to_string(),
        map: map.to_string(),
        mode: "competitive".to_string(),
        team1_score: 1,
        team2_score: 1,
        duration_minutes: 12,
        ended_at,
        round_count: 2,
        anomaly_count: 1,
        ingested_at: ended_at + Duration::seconds(1),
    };

    MatchBatch {
        record,
        rounds,
        events,
        accolades,
        snapshots: Vec::new(),
    }
}
