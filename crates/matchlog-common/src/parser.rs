//! Server log line parser
//!
//! Translates one log line into one [`LogEvent`]. The parser keeps no state
//! between lines and does not try to fix the order in which the server feed
//! delivers them.
//!
//! Classification works in two steps. The envelope (`L <timestamp>: <body>`)
//! is split first, then the body is dispatched on its leading shape:
//!
//! - `World triggered "<name>"` - round boundaries, bomb explosion, end of segment
//! - `Game Over: ...` - match summary
//! - `ACCOLADE, FINAL: ...` - end-of-match awards
//! - `"<player>" <verb> ...` - kills, assists, damage, bomb plant/defuse
//!
//! Once a body has been recognized by its shape, any failure to extract the
//! fields is a [`ParseError`]. Anything else is noise and yields `Ok(None)`.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

use crate::event::{
    AssistType, BombAction, EventKind, KillModifier, LogEvent, PlayerRef, Side, BOT_ID_PREFIX,
    TIMESTAMP_FORMAT,
};

/// Version of the line grammar understood by this parser
pub const GRAMMAR_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("malformed {kind} line: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

impl ParseError {
    fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}

/// `Ok(None)` means the line is not part of the grammar
pub type ParseResult = Result<Option<LogEvent>, ParseError>;

// Player token without the surrounding quotes handled by the callers
const PLAYER: &str = r#""(?P<NAME>[^"]*?)<(?P<SLOT>\d+)><(?P<ID>[^>]*)><(?P<SIDE>[^>]*)>""#;
const POSITION: &str = r"(?: \[-?\d+ -?\d+ -?\d+\])?";

fn player_pattern(tag: &str) -> String {
    // SIDE goes first since it contains ID
    PLAYER
        .replace("SIDE", &format!("{tag}_side"))
        .replace("NAME", &format!("{tag}_name"))
        .replace("SLOT", &format!("{tag}_slot"))
        .replace("ID", &format!("{tag}_id"))
}

static ENVELOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^L (\S+ - \S+): (.*)$").unwrap());

static LEADING_PLAYER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}{}", player_pattern("actor"), POSITION)).unwrap());

static KILL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^{}{} with "(?P<weapon>[^"]+)"(?P<flags>(?: \([a-z_]+\))*)$"#,
        player_pattern("victim"),
        POSITION
    ))
    .unwrap()
});

static FLAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([a-z_]+)\)").unwrap());

static ATTACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^{}{} with "(?P<weapon>[^"]+)" \(damage "(?P<damage>\d+)"\) \(damage_armor "(?P<armor_damage>\d+)"\) \(health "(?P<health>\d+)"\) \(armor "(?P<armor>\d+)"\) \(hitgroup "(?P<hitgroup>[^"]+)"\)$"#,
        player_pattern("victim"),
        POSITION
    ))
    .unwrap()
});

static ASSIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^{}(?: with "(?P<weapon>[^"]+)")?$"#,
        player_pattern("victim")
    ))
    .unwrap()
});

static SUICIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"(?P<weapon>[^"]+)"$"#).unwrap());

static BOMB_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?: at bombsite (?P<site>\w+))?(?: \(time_left "(?P<time_left>\d+)"\))?$"#)
        .unwrap()
});

static WORLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^World triggered "(?P<trigger>[^"]+)"(?P<rest>.*)$"#).unwrap());

static PROPERTIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?: \(\w+ "[^"]*"\))*$"#).unwrap());

static PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\((?P<key>\w+) "(?P<value>[^"]*)"\)"#).unwrap());

static GAME_OVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Game Over: (?P<mode>\S+) (?P<group>\S+) (?P<map>\S+) score (?P<s1>\d+):(?P<s2>\d+) after (?P<duration>\d+) min$",
    )
    .unwrap()
});

static ACCOLADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ACCOLADE, FINAL: \{(?P<award>[^}]+)\},\s*(?P<name>.*?)<(?P<slot>\d+)>,\s*VALUE: (?P<value>\S+),\s*POS: (?P<pos>\d+),\s*SCORE: (?P<score>\S+)$",
    )
    .unwrap()
});

/// Parse a line, discarding the distinction between noise and malformed lines
pub fn parse(line: &str) -> Option<LogEvent> {
    classify(line).ok().flatten()
}

/// Parse a line, reporting recognized-but-malformed lines as errors
pub fn classify(line: &str) -> ParseResult {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(envelope) = ENVELOPE.captures(line) else {
        return Ok(None);
    };

    let raw_timestamp = &envelope[1];
    let body = envelope.get(2).map_or("", |m| m.as_str());

    let Some(parse_body) = dispatch(body) else {
        return Ok(None);
    };

    let timestamp = parse_timestamp(raw_timestamp)?;
    Ok(parse_body(body)?.map(|kind| LogEvent::new(timestamp, kind)))
}

type BodyParser = fn(&str) -> Result<Option<EventKind>, ParseError>;

/// Select the body parser from the leading shape of the body
fn dispatch(body: &str) -> Option<BodyParser> {
    if body.starts_with("World triggered \"") {
        Some(parse_world)
    } else if body.starts_with("Game Over:") {
        Some(parse_game_over)
    } else if body.starts_with("ACCOLADE, FINAL:") {
        Some(parse_accolade)
    } else if body.starts_with('"') {
        Some(parse_player_action)
    } else {
        None
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

fn parse_world(body: &str) -> Result<Option<EventKind>, ParseError> {
    let Some(caps) = WORLD.captures(body) else {
        return Ok(None);
    };
    let trigger = &caps["trigger"];
    let rest = caps.name("rest").map_or("", |m| m.as_str());

    match trigger {
        "Round_Start" => Ok(Some(EventKind::RoundStart)),
        "Game_Processed" => Ok(Some(EventKind::GameProcessed)),
        "Round_End" => {
            let props = properties("RoundEnd", rest)?;
            let winner = match lookup(&props, "winner") {
                Some(raw) => Some(Side::from_log(raw).ok_or_else(|| {
                    ParseError::malformed("RoundEnd", format!("unknown winner side '{raw}'"))
                })?),
                None => None,
            };
            let participants = lookup(&props, "participants")
                .ok_or_else(|| ParseError::malformed("RoundEnd", "missing participants"))?
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();

            Ok(Some(EventKind::RoundEnd {
                winner,
                reason: lookup(&props, "reason").map(str::to_string),
                participants,
            }))
        }
        "Target_Bombed" => {
            let props = properties("Bomb", rest)?;
            Ok(Some(EventKind::Bomb {
                actor: lookup(&props, "planter").map(str::to_string),
                action: BombAction::Exploded,
                time_left: None,
                bombsite: None,
            }))
        }
        _ => Ok(None),
    }
}

/// Parse a ` (key "value") (key "value")` suffix
fn properties<'a>(
    kind: &'static str,
    rest: &'a str,
) -> Result<Vec<(&'a str, &'a str)>, ParseError> {
    if !PROPERTIES.is_match(rest) {
        return Err(ParseError::malformed(kind, format!("bad properties '{rest}'")));
    }
    Ok(PROPERTY
        .captures_iter(rest)
        .filter_map(|c| Some((c.name("key")?.as_str(), c.name("value")?.as_str())))
        .collect())
}

fn lookup<'a>(props: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    props.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn parse_game_over(body: &str) -> Result<Option<EventKind>, ParseError> {
    let caps = GAME_OVER
        .captures(body)
        .ok_or_else(|| ParseError::malformed("GameOver", body))?;

    Ok(Some(EventKind::GameOver {
        mode: caps["mode"].to_string(),
        map_group: caps["group"].to_string(),
        map: caps["map"].to_string(),
        team1_score: number("GameOver", &caps["s1"])?,
        team2_score: number("GameOver", &caps["s2"])?,
        duration_minutes: number("GameOver", &caps["duration"])?,
    }))
}

fn parse_accolade(body: &str) -> Result<Option<EventKind>, ParseError> {
    let caps = ACCOLADE
        .captures(body)
        .ok_or_else(|| ParseError::malformed("Accolade", body))?;

    let decimal = |field: &str| -> Result<f64, ParseError> {
        caps[field]
            .parse::<f64>()
            .map_err(|e| ParseError::malformed("Accolade", format!("{field}: {e}")))
    };

    Ok(Some(EventKind::Accolade {
        award: caps["award"].to_string(),
        player_name: caps["name"].trim().to_string(),
        slot: number("Accolade", &caps["slot"])?,
        value: decimal("value")?,
        position: number("Accolade", &caps["pos"])?,
        score: decimal("score")?,
    }))
}

fn parse_player_action(body: &str) -> Result<Option<EventKind>, ParseError> {
    // Lines such as cvar dumps also start with a quote; those are noise
    let Some(caps) = LEADING_PLAYER.captures(body) else {
        return Ok(None);
    };
    let actor = player_from(&caps, "actor")?;
    let rest = &body[caps.get(0).map_or(0, |m| m.end())..];

    if let Some(tail) = rest.strip_prefix(" killed ") {
        let caps = KILL
            .captures(tail)
            .ok_or_else(|| ParseError::malformed("Kill", tail))?;
        let mut headshot = false;
        let mut modifiers = Vec::new();
        for flag in FLAG.captures_iter(caps.name("flags").map_or("", |m| m.as_str())) {
            match &flag[1] {
                "headshot" => headshot = true,
                other => match KillModifier::from_log(other) {
                    Some(modifier) => modifiers.push(modifier),
                    None => {
                        return Err(ParseError::malformed(
                            "Kill",
                            format!("unknown flag '{other}'"),
                        ))
                    }
                },
            }
        }
        return Ok(Some(EventKind::Kill {
            attacker: actor,
            victim: player_from(&caps, "victim")?,
            weapon: caps["weapon"].to_string(),
            headshot,
            modifiers,
        }));
    }

    if let Some(tail) = rest.strip_prefix(" attacked ") {
        let caps = ATTACK
            .captures(tail)
            .ok_or_else(|| ParseError::malformed("Attack", tail))?;
        return Ok(Some(EventKind::Attack {
            attacker: actor,
            victim: player_from(&caps, "victim")?,
            weapon: caps["weapon"].to_string(),
            damage: number("Attack", &caps["damage"])?,
            armor_damage: number("Attack", &caps["armor_damage"])?,
            health: number("Attack", &caps["health"])?,
            armor: number("Attack", &caps["armor"])?,
            hitgroup: caps["hitgroup"].to_string(),
        }));
    }

    let assist = if let Some(tail) = rest.strip_prefix(" assisted killing ") {
        Some((AssistType::Damage, tail))
    } else {
        rest.strip_prefix(" flash-assisted killing ")
            .map(|tail| (AssistType::Flash, tail))
    };
    if let Some((assist_type, tail)) = assist {
        let caps = ASSIST
            .captures(tail)
            .ok_or_else(|| ParseError::malformed("Assist", tail))?;
        return Ok(Some(EventKind::Assist {
            assister: actor,
            victim: player_from(&caps, "victim")?,
            assist_type,
            weapon: caps.name("weapon").map(|m| m.as_str().to_string()),
        }));
    }

    if let Some(tail) = rest.strip_prefix(" committed suicide with ") {
        let caps = SUICIDE
            .captures(tail)
            .ok_or_else(|| ParseError::malformed("Suicide", tail))?;
        return Ok(Some(EventKind::Suicide {
            player: actor,
            weapon: caps["weapon"].to_string(),
        }));
    }

    if let Some(tail) = rest.strip_prefix(" triggered \"") {
        let (action, tail) = if let Some(tail) = tail.strip_prefix("Planted_The_Bomb\"") {
            (BombAction::Planted, tail)
        } else if let Some(tail) = tail.strip_prefix("Defused_The_Bomb\"") {
            (BombAction::Defused, tail)
        } else {
            // Bomb pickups, drops, defuse attempts
            return Ok(None);
        };
        let caps = BOMB_TRIGGER
            .captures(tail)
            .ok_or_else(|| ParseError::malformed("Bomb", tail))?;
        let time_left = caps
            .name("time_left")
            .map(|m| number("Bomb", m.as_str()))
            .transpose()?;
        return Ok(Some(EventKind::Bomb {
            actor: Some(actor.id),
            action,
            time_left,
            bombsite: caps.name("site").map(|m| m.as_str().to_string()),
        }));
    }

    Ok(None)
}

fn player_from(caps: &Captures<'_>, tag: &str) -> Result<PlayerRef, ParseError> {
    let field = |name: &str| {
        caps.name(&format!("{tag}_{name}"))
            .map_or("", |m| m.as_str())
            .to_string()
    };

    let name = field("name");
    let raw_id = field("id");
    let raw_side = field("side");

    let side = if raw_side.is_empty() {
        None
    } else {
        Some(Side::from_log(&raw_side).ok_or_else(|| {
            ParseError::malformed("player", format!("unknown side '{raw_side}'"))
        })?)
    };
    let id = if raw_id == "BOT" {
        format!("{BOT_ID_PREFIX}{name}")
    } else if raw_id.is_empty() {
        return Err(ParseError::malformed("player", format!("missing id for '{name}'")));
    } else {
        raw_id
    };

    Ok(PlayerRef {
        slot: number("player", &field("slot"))?,
        name,
        id,
        side,
    })
}

fn number(kind: &'static str, raw: &str) -> Result<u32, ParseError> {
    raw.parse::<u32>()
        .map_err(|e| ParseError::malformed(kind, format!("'{raw}': {e}")))
}
