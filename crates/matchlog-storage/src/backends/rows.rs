//! Conversions between domain types and the primitive column values both
//! drivers understand

use chrono::{DateTime, Utc};
use matchlog_common::{EventKind, Side};
use ulid::Ulid;

use crate::error::StorageError;
use crate::types::{
    AccoladeRecord, EventRecord, MatchId, MatchRecord, PlayerSnapshot, PlayerStats, RoundId,
    RoundRecord,
};

pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub fn from_micros(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::InvalidData(format!("timestamp out of range: {micros}")))
}

fn opt_from_micros(micros: Option<i64>) -> Result<Option<DateTime<Utc>>, StorageError> {
    micros.map(from_micros).transpose()
}

fn to_u32(value: i64, column: &str) -> Result<u32, StorageError> {
    u32::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("{column} out of range: {value}")))
}

fn parse_ulid(value: &str, column: &str) -> Result<Ulid, StorageError> {
    Ulid::from_string(value)
        .map_err(|e| StorageError::InvalidData(format!("invalid {column} '{value}': {e}")))
}

pub fn side_to_sql(side: Option<Side>) -> Option<&'static str> {
    side.map(|s| s.as_log_str())
}

fn side_from_sql(value: Option<String>) -> Result<Option<Side>, StorageError> {
    value
        .map(|v| {
            Side::from_log(&v).ok_or_else(|| StorageError::InvalidData(format!("unknown side '{v}'")))
        })
        .transpose()
}

pub fn encode_participants(participants: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(participants)
        .map_err(|e| StorageError::InvalidData(format!("failed to encode participants: {e}")))
}

pub fn encode_payload(kind: &EventKind) -> Result<String, StorageError> {
    serde_json::to_string(kind)
        .map_err(|e| StorageError::InvalidData(format!("failed to encode event payload: {e}")))
}

/// Owned column values of one `matches` row
pub struct MatchRow {
    pub match_id: String,
    pub source: String,
    pub map: String,
    pub mode: String,
    pub team1_score: i64,
    pub team2_score: i64,
    pub duration_minutes: i64,
    pub ended_at: i64,
    pub round_count: i64,
    pub anomaly_count: i64,
    pub ingested_at: i64,
}

impl MatchRow {
    pub fn into_record(self) -> Result<MatchRecord, StorageError> {
        Ok(MatchRecord {
            id: MatchId::from(parse_ulid(&self.match_id, "match_id")?),
            source: self.source,
            map: self.map,
            mode: self.mode,
            team1_score: to_u32(self.team1_score, "team1_score")?,
            team2_score: to_u32(self.team2_score, "team2_score")?,
            duration_minutes: to_u32(self.duration_minutes, "duration_minutes")?,
            ended_at: from_micros(self.ended_at)?,
            round_count: to_u32(self.round_count, "round_count")?,
            anomaly_count: to_u32(self.anomaly_count, "anomaly_count")?,
            ingested_at: from_micros(self.ingested_at)?,
        })
    }
}

pub struct RoundRow {
    pub round_id: String,
    pub match_id: String,
    pub round_number: i64,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub winner: Option<String>,
    pub reason: Option<String>,
    pub participants: String,
}

impl RoundRow {
    pub fn into_record(self) -> Result<RoundRecord, StorageError> {
        let participants: Vec<String> = serde_json::from_str(&self.participants)
            .map_err(|e| StorageError::InvalidData(format!("invalid participants: {e}")))?;

        Ok(RoundRecord {
            id: RoundId::from(parse_ulid(&self.round_id, "round_id")?),
            match_id: MatchId::from(parse_ulid(&self.match_id, "match_id")?),
            number: to_u32(self.round_number, "round_number")?,
            started_at: opt_from_micros(self.started_at)?,
            ended_at: opt_from_micros(self.ended_at)?,
            winner: side_from_sql(self.winner)?,
            reason: self.reason,
            participants,
        })
    }
}

pub struct EventRow {
    pub event_id: String,
    pub match_id: String,
    pub round_id: Option<String>,
    pub sequence: i64,
    pub event_timestamp: i64,
    pub payload: String,
    pub orphan: bool,
}

impl EventRow {
    pub fn into_record(self) -> Result<EventRecord, StorageError> {
        let kind: EventKind = serde_json::from_str(&self.payload).map_err(|e| {
            StorageError::InvalidData(format!("invalid payload for event {}: {e}", self.event_id))
        })?;

        Ok(EventRecord {
            id: parse_ulid(&self.event_id, "event_id")?,
            match_id: MatchId::from(parse_ulid(&self.match_id, "match_id")?),
            round_id: self
                .round_id
                .as_deref()
                .map(|id| parse_ulid(id, "round_id").map(RoundId::from))
                .transpose()?,
            sequence: to_u32(self.sequence, "sequence")?,
            timestamp: from_micros(self.event_timestamp)?,
            kind,
            orphan: self.orphan,
        })
    }
}

pub struct AccoladeRow {
    pub accolade_id: String,
    pub match_id: String,
    pub award: String,
    pub player_name: String,
    pub player_id: Option<String>,
    pub value: f64,
    pub position: i64,
    pub score: f64,
    pub awarded_at: i64,
}

impl AccoladeRow {
    pub fn into_record(self) -> Result<AccoladeRecord, StorageError> {
        Ok(AccoladeRecord {
            id: parse_ulid(&self.accolade_id, "accolade_id")?,
            match_id: MatchId::from(parse_ulid(&self.match_id, "match_id")?),
            award: self.award,
            player_name: self.player_name,
            player_id: self.player_id,
            value: self.value,
            position: to_u32(self.position, "position")?,
            score: self.score,
            awarded_at: from_micros(self.awarded_at)?,
        })
    }
}

pub struct SnapshotRow {
    pub player_id: String,
    pub match_id: String,
    pub recorded_at: i64,
    pub display_name: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub headshot_kills: i64,
    pub rounds_played: i64,
    pub clutches_won: i64,
    pub damage_dealt: i64,
    pub matches_played: i64,
    pub rating: f64,
}

impl SnapshotRow {
    pub fn into_snapshot(self) -> Result<PlayerSnapshot, StorageError> {
        let damage_dealt = u64::try_from(self.damage_dealt).map_err(|_| {
            StorageError::InvalidData(format!("damage_dealt out of range: {}", self.damage_dealt))
        })?;

        Ok(PlayerSnapshot {
            match_id: MatchId::from(parse_ulid(&self.match_id, "match_id")?),
            recorded_at: from_micros(self.recorded_at)?,
            stats: PlayerStats {
                player_id: self.player_id,
                display_name: self.display_name,
                kills: to_u32(self.kills, "kills")?,
                deaths: to_u32(self.deaths, "deaths")?,
                assists: to_u32(self.assists, "assists")?,
                headshot_kills: to_u32(self.headshot_kills, "headshot_kills")?,
                rounds_played: to_u32(self.rounds_played, "rounds_played")?,
                clutches_won: to_u32(self.clutches_won, "clutches_won")?,
                damage_dealt,
                matches_played: to_u32(self.matches_played, "matches_played")?,
                rating: self.rating,
            },
        })
    }
}

/// Clamp a u64 counter into a BIGINT column
pub fn u64_to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_round_trip() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T20:15:07.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(from_micros(to_micros(ts)).unwrap(), ts);
    }

    #[test]
    fn test_side_columns() {
        assert_eq!(side_to_sql(Some(Side::Terrorist)), Some("TERRORIST"));
        assert_eq!(
            side_from_sql(Some("CT".to_string())).unwrap(),
            Some(Side::Ct)
        );
        assert!(side_from_sql(Some("blue".to_string())).is_err());
        assert_eq!(side_from_sql(None).unwrap(), None);
    }

    #[test]
    fn test_negative_counter_is_invalid() {
        let row = SnapshotRow {
            player_id: "[U:1:1]".into(),
            match_id: Ulid::new().to_string(),
            recorded_at: 0,
            display_name: "Alice".into(),
            kills: -1,
            deaths: 0,
            assists: 0,
            headshot_kills: 0,
            rounds_played: 0,
            clutches_won: 0,
            damage_dealt: 0,
            matches_played: 0,
            rating: 1000.0,
        };
        assert!(matches!(
            row.into_snapshot(),
            Err(StorageError::InvalidData(_))
        ));
    }
}
