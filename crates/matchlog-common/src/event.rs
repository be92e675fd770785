//! Typed events produced by the line parser
//!
//! One [`LogEvent`] per recognized log line. The [`fmt::Display`] impl renders
//! the canonical grammar line, so `parse(&event.to_string())` yields the same
//! event back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used by the log envelope (`L 10/19/2026 - 20:15:03: ...`)
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y - %H:%M:%S";

/// Identity prefix given to bots, which share the literal id `BOT` in the log
pub const BOT_ID_PREFIX: &str = "BOT:";

/// Team side as written in player tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ct,
    Terrorist,
    Unassigned,
    Spectator,
}

impl Side {
    /// Parse the side spelling used by the server log
    pub fn from_log(s: &str) -> Option<Self> {
        match s {
            "CT" => Some(Self::Ct),
            "TERRORIST" | "T" => Some(Self::Terrorist),
            "Unassigned" => Some(Self::Unassigned),
            "Spectator" => Some(Self::Spectator),
            _ => None,
        }
    }

    pub fn as_log_str(&self) -> &'static str {
        match self {
            Self::Ct => "CT",
            Self::Terrorist => "TERRORIST",
            Self::Unassigned => "Unassigned",
            Self::Spectator => "Spectator",
        }
    }

    /// The opposing playing side, `None` for non-playing sides
    pub fn opponent(&self) -> Option<Self> {
        match self {
            Self::Ct => Some(Self::Terrorist),
            Self::Terrorist => Some(Self::Ct),
            Self::Unassigned | Self::Spectator => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Ct | Self::Terrorist)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_log_str())
    }
}

/// A player as referenced by a log line: `"Name<slot><id><SIDE>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Display name at the time of the line
    pub name: String,
    /// Server slot (user id)
    pub slot: u32,
    /// Stable identity; bots are `BOT:<name>`
    pub id: String,
    pub side: Option<Side>,
}

impl PlayerRef {
    pub fn is_bot(&self) -> bool {
        self.id.starts_with(BOT_ID_PREFIX)
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = if self.is_bot() { "BOT" } else { &self.id };
        let side = self.side.map(|s| s.as_log_str()).unwrap_or("");
        write!(f, "\"{}<{}><{}><{}>\"", self.name, self.slot, id, side)
    }
}

/// Extra kill flags carried after the weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillModifier {
    Penetrated,
    Noscope,
    Throughsmoke,
    Attackerblind,
    Attackerinair,
}

impl KillModifier {
    pub fn from_log(s: &str) -> Option<Self> {
        match s {
            "penetrated" => Some(Self::Penetrated),
            "noscope" => Some(Self::Noscope),
            "throughsmoke" => Some(Self::Throughsmoke),
            "attackerblind" => Some(Self::Attackerblind),
            "attackerinair" => Some(Self::Attackerinair),
            _ => None,
        }
    }

    pub fn as_log_str(&self) -> &'static str {
        match self {
            Self::Penetrated => "penetrated",
            Self::Noscope => "noscope",
            Self::Throughsmoke => "throughsmoke",
            Self::Attackerblind => "attackerblind",
            Self::Attackerinair => "attackerinair",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistType {
    Damage,
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BombAction {
    Planted,
    Defused,
    Exploded,
}

/// Event payload, one variant per recognized line kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    RoundStart,

    RoundEnd {
        winner: Option<Side>,
        reason: Option<String>,
        /// Stable ids of every player that took part in the round
        participants: Vec<String>,
    },

    Kill {
        attacker: PlayerRef,
        victim: PlayerRef,
        weapon: String,
        headshot: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        modifiers: Vec<KillModifier>,
    },

    /// Death without a killing player (fall damage, bomb, `kill` command)
    Suicide { player: PlayerRef, weapon: String },

    Assist {
        assister: PlayerRef,
        victim: PlayerRef,
        assist_type: AssistType,
        weapon: Option<String>,
    },

    Attack {
        attacker: PlayerRef,
        victim: PlayerRef,
        weapon: String,
        damage: u32,
        armor_damage: u32,
        health: u32,
        armor: u32,
        hitgroup: String,
    },

    Bomb {
        actor: Option<String>,
        action: BombAction,
        time_left: Option<u32>,
        bombsite: Option<String>,
    },

    GameOver {
        mode: String,
        map_group: String,
        map: String,
        team1_score: u32,
        team2_score: u32,
        duration_minutes: u32,
    },

    /// End-of-match award; only the display name is known
    Accolade {
        award: String,
        player_name: String,
        slot: u32,
        value: f64,
        position: u32,
        score: f64,
    },

    GameProcessed,
}

impl EventKind {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::RoundStart => "RoundStart",
            EventKind::RoundEnd { .. } => "RoundEnd",
            EventKind::Kill { .. } => "Kill",
            EventKind::Suicide { .. } => "Suicide",
            EventKind::Assist { .. } => "Assist",
            EventKind::Attack { .. } => "Attack",
            EventKind::Bomb { .. } => "Bomb",
            EventKind::GameOver { .. } => "GameOver",
            EventKind::Accolade { .. } => "Accolade",
            EventKind::GameProcessed => "GameProcessed",
        }
    }

    /// Events that happen inside a round window
    pub fn is_in_round(&self) -> bool {
        matches!(
            self,
            EventKind::Kill { .. }
                | EventKind::Suicide { .. }
                | EventKind::Assist { .. }
                | EventKind::Attack { .. }
                | EventKind::Bomb { .. }
        )
    }

    /// Every player reference carried by the event
    pub fn players(&self) -> Vec<&PlayerRef> {
        match self {
            EventKind::Kill {
                attacker, victim, ..
            }
            | EventKind::Attack {
                attacker, victim, ..
            } => vec![attacker, victim],
            EventKind::Assist {
                assister, victim, ..
            } => vec![assister, victim],
            EventKind::Suicide { player, .. } => vec![player],
            _ => Vec::new(),
        }
    }
}

/// A parsed log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl LogEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L {}: ", self.timestamp.format(TIMESTAMP_FORMAT))?;
        match &self.kind {
            EventKind::RoundStart => f.write_str("World triggered \"Round_Start\""),
            EventKind::RoundEnd {
                winner,
                reason,
                participants,
            } => {
                f.write_str("World triggered \"Round_End\"")?;
                if let Some(winner) = winner {
                    write!(f, " (winner \"{}\")", winner)?;
                }
                if let Some(reason) = reason {
                    write!(f, " (reason \"{}\")", reason)?;
                }
                write!(f, " (participants \"{}\")", participants.join(","))
            }
            EventKind::Kill {
                attacker,
                victim,
                weapon,
                headshot,
                modifiers,
            } => {
                write!(f, "{} killed {} with \"{}\"", attacker, victim, weapon)?;
                if *headshot {
                    f.write_str(" (headshot)")?;
                }
                for modifier in modifiers {
                    write!(f, " ({})", modifier.as_log_str())?;
                }
                Ok(())
            }
            EventKind::Suicide { player, weapon } => {
                write!(f, "{} committed suicide with \"{}\"", player, weapon)
            }
            EventKind::Assist {
                assister,
                victim,
                assist_type,
                weapon,
            } => {
                let verb = match assist_type {
                    AssistType::Damage => "assisted killing",
                    AssistType::Flash => "flash-assisted killing",
                };
                write!(f, "{} {} {}", assister, verb, victim)?;
                if let Some(weapon) = weapon {
                    write!(f, " with \"{}\"", weapon)?;
                }
                Ok(())
            }
            EventKind::Attack {
                attacker,
                victim,
                weapon,
                damage,
                armor_damage,
                health,
                armor,
                hitgroup,
            } => write!(
                f,
                "{} attacked {} with \"{}\" (damage \"{}\") (damage_armor \"{}\") (health \"{}\") (armor \"{}\") (hitgroup \"{}\")",
                attacker, victim, weapon, damage, armor_damage, health, armor, hitgroup
            ),
            EventKind::Bomb {
                actor,
                action,
                time_left,
                bombsite,
            } => {
                match action {
                    BombAction::Exploded => {
                        f.write_str("World triggered \"Target_Bombed\"")?;
                        if let Some(planter) = actor {
                            write!(f, " (planter \"{}\")", planter)?;
                        }
                    }
                    BombAction::Planted | BombAction::Defused => {
                        let trigger = if *action == BombAction::Planted {
                            "Planted_The_Bomb"
                        } else {
                            "Defused_The_Bomb"
                        };
                        let actor = PlayerRef {
                            name: String::new(),
                            slot: 0,
                            id: actor.clone().unwrap_or_default(),
                            side: None,
                        };
                        write!(f, "{} triggered \"{}\"", actor, trigger)?;
                        if let Some(site) = bombsite {
                            write!(f, " at bombsite {}", site)?;
                        }
                    }
                }
                if let Some(time_left) = time_left {
                    write!(f, " (time_left \"{}\")", time_left)?;
                }
                Ok(())
            }
            EventKind::GameOver {
                mode,
                map_group,
                map,
                team1_score,
                team2_score,
                duration_minutes,
            } => write!(
                f,
                "Game Over: {} {} {} score {}:{} after {} min",
                mode, map_group, map, team1_score, team2_score, duration_minutes
            ),
            EventKind::Accolade {
                award,
                player_name,
                slot,
                value,
                position,
                score,
            } => write!(
                f,
                "ACCOLADE, FINAL: {{{}}},\t{}<{}>,\tVALUE: {:.6},\tPOS: {},\tSCORE: {:.6}",
                award, player_name, slot, value, position, score
            ),
            EventKind::GameProcessed => f.write_str("World triggered \"Game_Processed\""),
        }
    }
}
