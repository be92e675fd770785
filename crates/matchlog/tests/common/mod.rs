//! Shared fixtures for pipeline tests
//!
//! Log segments are rendered from typed events, so every line is in the
//! grammar the parser reads. `FailingStore` wraps a real store and fails on
//! demand to exercise the retry path.

#![allow(dead_code)]

pub mod failing_store;

use chrono::{DateTime, TimeZone, Utc};
use matchlog::ingest::flush::FlushCoordinator;
use matchlog::{Ingestor, RatingConfig};
use matchlog_common::{AssistType, EventKind, LogEvent, PlayerRef, Side};
use matchlog_storage::{create_storage, Storage, StorageConfig};
use std::sync::Arc;
use std::time::Duration;

pub use failing_store::FailingStore;

pub const ALICE: &str = "[U:1:1001]";
pub const BOB: &str = "[U:1:1002]";
pub const CAROL: &str = "[U:1:1003]";
pub const DAVE: &str = "[U:1:1004]";

/// Whole-second timestamp, the resolution of log lines
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .expect("valid timestamp")
}

fn player(name: &str, slot: u32, id: &str, side: Side) -> PlayerRef {
    PlayerRef {
        name: name.to_string(),
        slot,
        id: id.to_string(),
        side: Some(side),
    }
}

pub fn alice() -> PlayerRef {
    player("Alice", 2, ALICE, Side::Ct)
}

pub fn carol() -> PlayerRef {
    player("Carol", 4, CAROL, Side::Ct)
}

pub fn bob() -> PlayerRef {
    player("Bob", 3, BOB, Side::Terrorist)
}

pub fn dave() -> PlayerRef {
    player("Dave", 5, DAVE, Side::Terrorist)
}

/// Render one log line
pub fn line(secs: i64, kind: EventKind) -> String {
    LogEvent::new(at(secs), kind).to_string()
}

pub fn kill(attacker: PlayerRef, victim: PlayerRef, headshot: bool) -> EventKind {
    EventKind::Kill {
        attacker,
        victim,
        weapon: "ak47".into(),
        headshot,
        modifiers: Vec::new(),
    }
}

pub fn game_over(map: &str, team1: u32, team2: u32) -> EventKind {
    EventKind::GameOver {
        mode: "competitive".into(),
        map_group: "mg_active".into(),
        map: map.into(),
        team1_score: team1,
        team2_score: team2,
        duration_minutes: 41,
    }
}

pub fn accolade(award: &str, name: &str, slot: u32) -> EventKind {
    EventKind::Accolade {
        award: award.into(),
        player_name: name.into(),
        slot,
        value: 3.0,
        position: 1,
        score: 40.0,
    }
}

fn round_end(winner: Side) -> EventKind {
    EventKind::RoundEnd {
        winner: Some(winner),
        reason: Some(match winner {
            Side::Ct => "SFUI_Notice_CTs_Win".into(),
            _ => "SFUI_Notice_Terrorists_Win".into(),
        }),
        participants: vec![ALICE.into(), BOB.into(), CAROL.into(), DAVE.into()],
    }
}

/// Lines of one round starting at `secs`; the CT round carries an assist and damage
pub fn round(secs: i64, ct_wins: bool) -> Vec<String> {
    if ct_wins {
        vec![
            line(secs, EventKind::RoundStart),
            line(
                secs + 1,
                EventKind::Attack {
                    attacker: alice(),
                    victim: bob(),
                    weapon: "ak47".into(),
                    damage: 27,
                    armor_damage: 5,
                    health: 73,
                    armor: 95,
                    hitgroup: "chest".into(),
                },
            ),
            line(secs + 2, kill(alice(), bob(), true)),
            line(
                secs + 2,
                EventKind::Assist {
                    assister: carol(),
                    victim: bob(),
                    assist_type: AssistType::Flash,
                    weapon: None,
                },
            ),
            line(secs + 3, kill(carol(), dave(), false)),
            line(secs + 4, round_end(Side::Ct)),
        ]
    } else {
        vec![
            line(secs, EventKind::RoundStart),
            line(secs + 1, kill(bob(), alice(), false)),
            line(secs + 2, kill(dave(), carol(), false)),
            line(secs + 3, round_end(Side::Terrorist)),
        ]
    }
}

/// A complete segment in server order: summary lines first, then the rounds
///
/// CT wins the first `ct_rounds` rounds, then the terrorists win the rest.
pub fn competitive_match(map: &str, base: i64, ct_rounds: u32, t_rounds: u32) -> Vec<String> {
    let mut lines = vec![
        line(base, game_over(map, ct_rounds, t_rounds)),
        line(base, accolade("kills", "Alice", 2)),
    ];

    for n in 0..(ct_rounds + t_rounds) {
        lines.extend(round(base + 10 * i64::from(n + 1), n < ct_rounds));
    }

    lines.push(line(
        base + 10 * i64::from(ct_rounds + t_rounds + 1),
        EventKind::GameProcessed,
    ));
    lines
}

pub async fn memory_storage() -> Arc<dyn Storage> {
    create_storage(&StorageConfig::sqlite_memory())
        .await
        .expect("in-memory sqlite should open")
}

pub fn coordinator(storage: Arc<dyn Storage>) -> FlushCoordinator {
    FlushCoordinator::new(storage, RatingConfig::default(), Duration::from_secs(5))
}

pub fn ingestor(storage: Arc<dyn Storage>) -> Ingestor {
    Ingestor::new("test-server", coordinator(storage))
}
