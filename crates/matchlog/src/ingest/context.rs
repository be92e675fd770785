//! Per-match reconciliation state
//!
//! A server writes the end-of-match summary (`Game Over`, accolades) before it
//! replays the round detail, so events cannot be linked by reading a
//! game → round → event hierarchy top down. [`MatchContext`] instead opens a
//! match on `GameOver`, links every following event to it and to the round
//! that is open when the event arrives, and hands the finished segment out as
//! a [`ReconciledMatch`] on `GameProcessed`.
//!
//! Arrival order is authoritative. An event stamped with the same second as a
//! `RoundEnd` belongs to that round only if its line came first.

use chrono::{DateTime, Utc};
use matchlog_common::{AssistType, EventKind, LogEvent, PlayerRef, Side};
use matchlog_storage::{AccoladeRecord, EventRecord, MatchId, MatchRecord, RoundId, RoundRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::metrics::counters;

/// Health damage credited for a single hit
pub const MAX_DAMAGE_PER_HIT: u32 = 100;

/// Non-fatal irregularities found while linking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// A round was still open when the next round started or the match closed
    UnclosedRound,
    /// An in-round event arrived while no round was open
    OrphanEvent,
    /// `RoundEnd` arrived while no round was open
    RoundEndWithoutStart,
    /// Stored rounds differ from the final score's total
    RoundCountMismatch,
    /// `GameProcessed` arrived with no open match
    ProcessedWithoutMatch,
    /// A round or in-round event arrived before any `GameOver`
    EventOutsideMatch,
    /// A new `GameOver` replaced a match that never saw `GameProcessed`
    SupersededMatch,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnclosedRound => "unclosed_round",
            Self::OrphanEvent => "orphan_event",
            Self::RoundEndWithoutStart => "round_end_without_start",
            Self::RoundCountMismatch => "round_count_mismatch",
            Self::ProcessedWithoutMatch => "processed_without_match",
            Self::EventOutsideMatch => "event_outside_match",
            Self::SupersededMatch => "superseded_match",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Timestamp of the line that revealed the anomaly
    pub at: DateTime<Utc>,
    pub detail: String,
}

/// One player's contribution to one match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchTally {
    pub player_id: String,
    /// Last display name seen for the player in the segment
    pub display_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub headshot_kills: u32,
    pub damage_dealt: u64,
    pub rounds_played: u32,
    pub clutches_won: u32,
}

impl MatchTally {
    fn new(player_id: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            display_name: player_id.to_string(),
            ..Self::default()
        }
    }
}

/// A fully linked match segment, ready to flush
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledMatch {
    pub record: MatchRecord,
    pub rounds: Vec<RoundRecord>,
    pub events: Vec<EventRecord>,
    pub accolades: Vec<AccoladeRecord>,
    /// Keyed by player id; bots are never tallied
    pub tallies: BTreeMap<String, MatchTally>,
    pub anomalies: Vec<Anomaly>,
}

/// Accolade line seen before its match was resolved
#[derive(Debug, Clone)]
struct PendingAccolade {
    award: String,
    player_name: String,
    value: f64,
    position: u32,
    score: f64,
}

#[derive(Debug)]
struct OpenMatch {
    id: MatchId,
    map: String,
    mode: String,
    team1_score: u32,
    team2_score: u32,
    duration_minutes: u32,
    ended_at: DateTime<Utc>,
    rounds: Vec<RoundRecord>,
    /// Index into `rounds` plus the index of the round's first event
    current_round: Option<(usize, usize)>,
    events: Vec<EventRecord>,
    accolades: Vec<PendingAccolade>,
    /// Display name → stable id, learned from every player token
    names: HashMap<String, String>,
    /// Stable id → side, learned from the open round's tokens only
    round_sides: HashMap<String, Side>,
    tallies: BTreeMap<String, MatchTally>,
    anomalies: Vec<Anomaly>,
}

impl OpenMatch {
    fn new(timestamp: DateTime<Utc>, kind: &EventKind) -> Option<Self> {
        let EventKind::GameOver {
            mode,
            map,
            team1_score,
            team2_score,
            duration_minutes,
            ..
        } = kind
        else {
            return None;
        };

        Some(Self {
            id: MatchId::new(),
            map: map.clone(),
            mode: mode.clone(),
            team1_score: *team1_score,
            team2_score: *team2_score,
            duration_minutes: *duration_minutes,
            ended_at: timestamp,
            rounds: Vec::new(),
            current_round: None,
            events: Vec::new(),
            accolades: Vec::new(),
            names: HashMap::new(),
            round_sides: HashMap::new(),
            tallies: BTreeMap::new(),
            anomalies: Vec::new(),
        })
    }

    fn record_anomaly(&mut self, kind: AnomalyKind, at: DateTime<Utc>, detail: String) {
        warn!(match_id = %self.id, map = %self.map, anomaly = %kind, %detail, "match anomaly");
        counters::record_anomaly(kind.as_str());
        self.anomalies.push(Anomaly { kind, at, detail });
    }

    fn push_event(&mut self, event: LogEvent, round_id: Option<RoundId>, orphan: bool) {
        let sequence = self.events.len() as u32;
        self.events.push(EventRecord {
            id: Ulid::new(),
            match_id: self.id,
            round_id,
            sequence,
            timestamp: event.timestamp,
            kind: event.kind,
            orphan,
        });
    }

    fn tally(&mut self, player_id: &str) -> &mut MatchTally {
        self.tallies
            .entry(player_id.to_string())
            .or_insert_with(|| MatchTally::new(player_id))
    }

    fn learn(&mut self, player: &PlayerRef) {
        self.names.insert(player.name.clone(), player.id.clone());
        if let (Some(side), Some(_)) = (player.side, self.current_round) {
            self.round_sides.insert(player.id.clone(), side);
        }
        if !player.is_bot() {
            self.tally(&player.id).display_name = player.name.clone();
        }
    }

    fn open_round(&mut self, event: LogEvent) {
        if let Some((idx, _)) = self.current_round.take() {
            let number = self.rounds[idx].number;
            self.record_anomaly(
                AnomalyKind::UnclosedRound,
                event.timestamp,
                format!("round {number} never ended"),
            );
        }

        let round = RoundRecord {
            id: RoundId::new(),
            match_id: self.id,
            number: self.rounds.len() as u32 + 1,
            started_at: Some(event.timestamp),
            ended_at: None,
            winner: None,
            reason: None,
            participants: Vec::new(),
        };
        let round_id = round.id;
        self.rounds.push(round);
        self.round_sides.clear();
        self.current_round = Some((self.rounds.len() - 1, self.events.len()));
        self.push_event(event, Some(round_id), false);
    }

    fn close_round(&mut self, event: LogEvent) {
        let EventKind::RoundEnd {
            winner,
            reason,
            participants,
        } = &event.kind
        else {
            return;
        };

        let Some((idx, first_event)) = self.current_round.take() else {
            self.record_anomaly(
                AnomalyKind::RoundEndWithoutStart,
                event.timestamp,
                "round end with no open round".to_string(),
            );
            self.push_event(event, None, true);
            return;
        };

        let (winner, reason, participants) = (*winner, reason.clone(), participants.clone());

        for id in participants.iter().filter(|id| !is_bot_id(id)) {
            self.tally(id).rounds_played += 1;
        }

        if let (Some(winner), Some((clutcher, side))) =
            (winner, self.clutch_candidate(first_event, &participants))
        {
            if side == winner && !is_bot_id(&clutcher) {
                debug!(match_id = %self.id, player = %clutcher, "clutch won");
                self.tally(&clutcher).clutches_won += 1;
            }
        }

        let round = &mut self.rounds[idx];
        round.ended_at = Some(event.timestamp);
        round.winner = winner;
        round.reason = reason;
        round.participants = participants;
        let round_id = round.id;

        self.push_event(event, Some(round_id), false);
    }

    /// Replay the round's deaths and find the first player left alone on
    /// their side while the other side still stands
    ///
    /// Participants without a token in this round have no known side and are
    /// left out of the replay.
    fn clutch_candidate(
        &self,
        first_event: usize,
        participants: &[String],
    ) -> Option<(String, Side)> {
        let mut alive: HashMap<Side, HashSet<&str>> = HashMap::new();
        for id in participants {
            if let Some(side) = self.round_sides.get(id).filter(|s| s.is_playing()) {
                alive.entry(*side).or_default().insert(id.as_str());
            }
        }

        for event in &self.events[first_event..] {
            let victim = match &event.kind {
                EventKind::Kill { victim, .. } => victim,
                EventKind::Suicide { player, .. } => player,
                _ => continue,
            };

            let Some(side) = victim
                .side
                .or_else(|| self.round_sides.get(&victim.id).copied())
                .filter(|s| s.is_playing())
            else {
                continue;
            };
            if let Some(members) = alive.get_mut(&side) {
                members.remove(victim.id.as_str());
            }

            for side in [Side::Ct, Side::Terrorist] {
                let own = alive.get(&side).map(HashSet::len).unwrap_or(0);
                let others = side
                    .opponent()
                    .and_then(|o| alive.get(&o))
                    .map(HashSet::len)
                    .unwrap_or(0);
                if own == 1 && others >= 1 {
                    return alive
                        .get(&side)
                        .and_then(|m| m.iter().next())
                        .map(|id| (id.to_string(), side));
                }
            }
        }

        None
    }

    fn link_in_round(&mut self, event: LogEvent) {
        for player in event.kind.players() {
            self.learn(player);
        }

        let Some((idx, _)) = self.current_round else {
            self.record_anomaly(
                AnomalyKind::OrphanEvent,
                event.timestamp,
                format!("{} outside any round", event.event_type()),
            );
            self.push_event(event, None, true);
            return;
        };

        self.count(&event.kind);
        let round_id = self.rounds[idx].id;
        self.push_event(event, Some(round_id), false);
    }

    fn count(&mut self, kind: &EventKind) {
        match kind {
            EventKind::Kill {
                attacker,
                victim,
                headshot,
                ..
            } => {
                if !victim.is_bot() {
                    self.tally(&victim.id).deaths += 1;
                }
                if attacker.is_bot() || attacker.id == victim.id || same_team(attacker, victim) {
                    return;
                }
                let tally = self.tally(&attacker.id);
                tally.kills += 1;
                if *headshot {
                    tally.headshot_kills += 1;
                }
            }
            EventKind::Suicide { player, .. } => {
                if !player.is_bot() {
                    self.tally(&player.id).deaths += 1;
                }
            }
            EventKind::Assist {
                assister,
                victim,
                assist_type,
                ..
            } => {
                if assister.is_bot() || same_team(assister, victim) {
                    return;
                }
                if matches!(assist_type, AssistType::Damage | AssistType::Flash) {
                    self.tally(&assister.id).assists += 1;
                }
            }
            EventKind::Attack {
                attacker,
                victim,
                damage,
                ..
            } => {
                if attacker.is_bot() || attacker.id == victim.id || same_team(attacker, victim) {
                    return;
                }
                self.tally(&attacker.id).damage_dealt +=
                    u64::from((*damage).min(MAX_DAMAGE_PER_HIT));
            }
            _ => {}
        }
    }

    fn finish(mut self, source: &str, at: DateTime<Utc>) -> ReconciledMatch {
        if let Some((idx, _)) = self.current_round.take() {
            let number = self.rounds[idx].number;
            self.record_anomaly(
                AnomalyKind::UnclosedRound,
                at,
                format!("round {number} still open at match close"),
            );
        }

        let expected = self.team1_score + self.team2_score;
        if self.rounds.len() as u32 != expected {
            let detail = format!(
                "{} rounds linked, score {}:{} implies {}",
                self.rounds.len(),
                self.team1_score,
                self.team2_score,
                expected
            );
            self.record_anomaly(AnomalyKind::RoundCountMismatch, at, detail);
        }

        let accolades = self
            .accolades
            .drain(..)
            .map(|a| AccoladeRecord {
                id: Ulid::new(),
                match_id: self.id,
                player_id: self
                    .names
                    .get(&a.player_name)
                    .filter(|id| !is_bot_id(id))
                    .cloned(),
                award: a.award,
                player_name: a.player_name,
                value: a.value,
                position: a.position,
                score: a.score,
                awarded_at: self.ended_at,
            })
            .collect();

        let record = MatchRecord {
            id: self.id,
            source: source.to_string(),
            map: self.map,
            mode: self.mode,
            team1_score: self.team1_score,
            team2_score: self.team2_score,
            duration_minutes: self.duration_minutes,
            ended_at: self.ended_at,
            round_count: self.rounds.len() as u32,
            anomaly_count: self.anomalies.len() as u32,
            ingested_at: Utc::now(),
        };

        ReconciledMatch {
            record,
            rounds: self.rounds,
            events: self.events,
            accolades,
            tallies: self.tallies,
            anomalies: self.anomalies,
        }
    }
}

fn is_bot_id(id: &str) -> bool {
    id == "BOT" || id.starts_with(matchlog_common::event::BOT_ID_PREFIX)
}

fn same_team(a: &PlayerRef, b: &PlayerRef) -> bool {
    matches!((a.side, b.side), (Some(x), Some(y)) if x == y && x.is_playing())
}

/// Linking state for the one match currently being assembled
///
/// Owned by a single producer and driven with `&mut self`, one event at a
/// time, in arrival order.
#[derive(Debug)]
pub struct MatchContext {
    source: String,
    open: Option<OpenMatch>,
    /// Accolades that arrived before their `GameOver`
    early_accolades: Vec<PendingAccolade>,
    /// Anomalies raised while no match was open
    stray: Vec<Anomaly>,
}

impl MatchContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            open: None,
            early_accolades: Vec::new(),
            stray: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether a `GameOver` has opened a match that is not yet processed
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Id of the open match, if any
    pub fn current_match(&self) -> Option<MatchId> {
        self.open.as_ref().map(|m| m.id)
    }

    /// Link one event; returns the finished match on `GameProcessed`
    pub fn apply(&mut self, event: LogEvent) -> Option<ReconciledMatch> {
        match &event.kind {
            EventKind::GameOver { .. } => {
                self.open_match(event);
                None
            }
            EventKind::Accolade {
                award,
                player_name,
                value,
                position,
                score,
                ..
            } => {
                let pending = PendingAccolade {
                    award: award.clone(),
                    player_name: player_name.clone(),
                    value: *value,
                    position: *position,
                    score: *score,
                };
                match self.open.as_mut() {
                    Some(open) => open.accolades.push(pending),
                    None => self.early_accolades.push(pending),
                }
                None
            }
            EventKind::GameProcessed => self.close(event.timestamp),
            _ => {
                let Some(open) = self.open.as_mut() else {
                    self.stray_anomaly(
                        AnomalyKind::EventOutsideMatch,
                        event.timestamp,
                        format!("{} before any game over", event.event_type()),
                    );
                    return None;
                };
                match event.kind {
                    EventKind::RoundStart => open.open_round(event),
                    EventKind::RoundEnd { .. } => open.close_round(event),
                    _ => open.link_in_round(event),
                }
                None
            }
        }
    }

    /// Discard everything buffered without producing a match
    pub fn abort(&mut self) {
        if let Some(open) = self.open.take() {
            debug!(match_id = %open.id, events = open.events.len(), "match context aborted");
        }
        self.early_accolades.clear();
    }

    /// Anomalies raised while idle, drained
    pub fn take_stray_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.stray)
    }

    fn open_match(&mut self, event: LogEvent) {
        if let Some(previous) = self.open.take() {
            self.stray_anomaly(
                AnomalyKind::SupersededMatch,
                event.timestamp,
                format!(
                    "match {} on {} discarded by a new game over",
                    previous.id, previous.map
                ),
            );
        }

        let Some(mut open) = OpenMatch::new(event.timestamp, &event.kind) else {
            return;
        };
        open.accolades = std::mem::take(&mut self.early_accolades);
        debug!(match_id = %open.id, map = %open.map, "match opened");
        open.push_event(event, None, false);
        self.open = Some(open);
    }

    fn close(&mut self, at: DateTime<Utc>) -> Option<ReconciledMatch> {
        let Some(open) = self.open.take() else {
            self.stray_anomaly(
                AnomalyKind::ProcessedWithoutMatch,
                at,
                "game processed with no open match".to_string(),
            );
            self.early_accolades.clear();
            return None;
        };

        let reconciled = open.finish(&self.source, at);
        debug!(
            match_id = %reconciled.record.id,
            rounds = reconciled.rounds.len(),
            events = reconciled.events.len(),
            anomalies = reconciled.anomalies.len(),
            "match reconciled"
        );
        Some(reconciled)
    }

    fn stray_anomaly(&mut self, kind: AnomalyKind, at: DateTime<Utc>, detail: String) {
        warn!(source = %self.source, anomaly = %kind, %detail, "anomaly outside match");
        counters::record_anomaly(kind.as_str());
        self.stray.push(Anomaly { kind, at, detail });
    }
}
