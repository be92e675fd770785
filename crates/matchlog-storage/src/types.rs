//! Domain types for storage layer

use chrono::{DateTime, Utc};
use matchlog_common::{EventKind, Side};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            pub fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Ulid> for $name {
            fn from(id: Ulid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self)
            }
        }
    };
}

ulid_id!(
    /// Strongly-typed match identifier
    MatchId
);

ulid_id!(
    /// Strongly-typed round identifier
    RoundId
);

/// A finished match (aggregate root)
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub id: MatchId,
    /// Identity of the log source the match was ingested from
    pub source: String,
    pub map: String,
    pub mode: String,
    pub team1_score: u32,
    pub team2_score: u32,
    pub duration_minutes: u32,
    /// Timestamp of the GameOver line; with `map` this is the dedup key
    pub ended_at: DateTime<Utc>,
    pub round_count: u32,
    pub anomaly_count: u32,
    pub ingested_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Rounds implied by the final score
    pub fn expected_rounds(&self) -> u32 {
        self.team1_score + self.team2_score
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub id: RoundId,
    pub match_id: MatchId,
    /// 1-based position in arrival order
    pub number: u32,
    pub started_at: Option<DateTime<Utc>>,
    /// `None` when the round never saw its RoundEnd line
    pub ended_at: Option<DateTime<Utc>>,
    pub winner: Option<Side>,
    pub reason: Option<String>,
    pub participants: Vec<String>,
}

/// A linked in-match event
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: Ulid,
    pub match_id: MatchId,
    /// `None` for events that fell outside any round window
    pub round_id: Option<RoundId>,
    /// Arrival position within the match segment
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub orphan: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccoladeRecord {
    pub id: Ulid,
    pub match_id: MatchId,
    pub award: String,
    pub player_name: String,
    /// Resolved from the display name when the name was seen during the match
    pub player_id: Option<String>,
    pub value: f64,
    pub position: u32,
    pub score: f64,
    /// Always the owning match's end time
    pub awarded_at: DateTime<Utc>,
}

/// Running per-player tally and rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: String,
    pub display_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub headshot_kills: u32,
    pub rounds_played: u32,
    pub clutches_won: u32,
    pub damage_dealt: u64,
    pub matches_played: u32,
    pub rating: f64,
}

impl PlayerStats {
    /// Fresh stats for a player never seen before
    pub fn new(player_id: impl Into<String>, display_name: impl Into<String>, rating: f64) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
            kills: 0,
            deaths: 0,
            assists: 0,
            headshot_kills: 0,
            rounds_played: 0,
            clutches_won: 0,
            damage_dealt: 0,
            matches_played: 0,
            rating,
        }
    }

    /// Kill/death ratio; with zero deaths the kill count is returned
    pub fn kd_ratio(&self) -> f64 {
        if self.deaths == 0 {
            f64::from(self.kills)
        } else {
            f64::from(self.kills) / f64::from(self.deaths)
        }
    }

    /// Average damage per round, 0 without rounds
    pub fn adr(&self) -> f64 {
        if self.rounds_played == 0 {
            0.0
        } else {
            self.damage_dealt as f64 / f64::from(self.rounds_played)
        }
    }

    /// Share of kills that were headshots, 0 without kills
    pub fn headshot_ratio(&self) -> f64 {
        if self.kills == 0 {
            0.0
        } else {
            f64::from(self.headshot_kills) / f64::from(self.kills)
        }
    }
}

/// Archived stats of one player as of one match
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub match_id: MatchId,
    /// End time of the match the snapshot belongs to
    pub recorded_at: DateTime<Utc>,
    pub stats: PlayerStats,
}

/// Everything one match flush writes, committed as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct MatchBatch {
    pub record: MatchRecord,
    pub rounds: Vec<RoundRecord>,
    pub events: Vec<EventRecord>,
    pub accolades: Vec<AccoladeRecord>,
    pub snapshots: Vec<PlayerSnapshot>,
}

/// Result of [`crate::MatchStore::persist_match`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The batch was committed
    Inserted(MatchId),
    /// A match with the same end time and map already exists; nothing was written
    Duplicate(MatchId),
}
