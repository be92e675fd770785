//! Table, JSON and CSV rendering for CLI results

use chrono::{DateTime, Utc};
use matchlog_storage::{MatchRecord, PlayerSnapshot, PlayerStats};
use serde::Serialize;
use std::io::Write;

use crate::cli::OutputFormat;
use crate::ingest::flush::FlushOutcome;
use crate::ingest::IngestReport;

/// Trait for types that can be displayed in table format
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn short_id(id: &str) -> String {
    if id.len() > 12 {
        format!("{}...", &id[..12])
    } else {
        id.to_string()
    }
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// One leaderboard line
#[derive(Debug, Serialize)]
pub struct Ranked {
    pub rank: usize,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

impl Ranked {
    pub fn from_board(board: Vec<PlayerStats>) -> Vec<Self> {
        board
            .into_iter()
            .enumerate()
            .map(|(i, stats)| Self { rank: i + 1, stats })
            .collect()
    }
}

impl TableDisplay for Ranked {
    fn headers() -> Vec<&'static str> {
        vec!["#", "PLAYER", "NAME", "RATING", "MATCHES", "K/D", "ADR", "HS%"]
    }

    fn row(&self) -> Vec<String> {
        let s = &self.stats;
        vec![
            self.rank.to_string(),
            s.player_id.clone(),
            s.display_name.clone(),
            format!("{:.1}", s.rating),
            s.matches_played.to_string(),
            format!("{:.2}", s.kd_ratio()),
            format!("{:.1}", s.adr()),
            format!("{:.0}", s.headshot_ratio() * 100.0),
        ]
    }
}

/// One archived snapshot of a player's history
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub match_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

impl From<PlayerSnapshot> for HistoryEntry {
    fn from(snapshot: PlayerSnapshot) -> Self {
        Self {
            match_id: snapshot.match_id.to_string(),
            recorded_at: snapshot.recorded_at,
            stats: snapshot.stats,
        }
    }
}

impl TableDisplay for HistoryEntry {
    fn headers() -> Vec<&'static str> {
        vec!["MATCH", "ENDED", "RATING", "MATCHES", "KILLS", "DEATHS", "CLUTCHES"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            short_id(&self.match_id),
            format_time(self.recorded_at),
            format!("{:.1}", self.stats.rating),
            self.stats.matches_played.to_string(),
            self.stats.kills.to_string(),
            self.stats.deaths.to_string(),
            self.stats.clutches_won.to_string(),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct MatchSummary {
    pub id: String,
    pub source: String,
    pub map: String,
    pub mode: String,
    pub score: String,
    pub rounds: u32,
    pub anomalies: u32,
    pub ended_at: DateTime<Utc>,
}

impl From<MatchRecord> for MatchSummary {
    fn from(record: MatchRecord) -> Self {
        Self {
            id: record.id.to_string(),
            source: record.source,
            map: record.map,
            mode: record.mode,
            score: format!("{}:{}", record.team1_score, record.team2_score),
            rounds: record.round_count,
            anomalies: record.anomaly_count,
            ended_at: record.ended_at,
        }
    }
}

impl TableDisplay for MatchSummary {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "ENDED", "MAP", "SCORE", "ROUNDS", "ANOMALIES", "SOURCE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            short_id(&self.id),
            format_time(self.ended_at),
            self.map.clone(),
            self.score.clone(),
            self.rounds.to_string(),
            self.anomalies.to_string(),
            self.source.clone(),
        ]
    }
}

/// Outcome of one ingested match segment
#[derive(Debug, Serialize)]
pub struct IngestLine {
    pub match_id: String,
    pub map: String,
    pub rounds: u32,
    pub events: usize,
    pub anomalies: usize,
    pub status: String,
}

impl From<&IngestReport> for IngestLine {
    fn from(report: &IngestReport) -> Self {
        let status = match &report.flush {
            Ok(FlushOutcome::Persisted { players, .. }) => {
                format!("persisted ({} players)", players.len())
            }
            Ok(FlushOutcome::Duplicate { existing }) => format!("duplicate of {}", existing),
            Err(e) => format!("failed: {}", e),
        };

        Self {
            match_id: report.match_id.to_string(),
            map: report.map.clone(),
            rounds: report.round_count,
            events: report.event_count,
            anomalies: report.anomalies.len(),
            status,
        }
    }
}

impl TableDisplay for IngestLine {
    fn headers() -> Vec<&'static str> {
        vec!["MATCH", "MAP", "ROUNDS", "EVENTS", "ANOMALIES", "STATUS"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            short_id(&self.match_id),
            self.map.clone(),
            self.rounds.to_string(),
            self.events.to_string(),
            self.anomalies.to_string(),
            self.status.clone(),
        ]
    }
}

/// Print items in the specified format
pub fn print_items<T>(items: &[T], format: OutputFormat)
where
    T: TableDisplay + Serialize,
{
    let stdout = std::io::stdout();
    if let Err(e) = write_items(&mut stdout.lock(), items, format) {
        eprintln!("Error writing output: {}", e);
    }
}

/// Render items in the specified format to any writer
pub fn write_items<W, T>(out: &mut W, items: &[T], format: OutputFormat) -> anyhow::Result<()>
where
    W: Write,
    T: TableDisplay + Serialize,
{
    match format {
        OutputFormat::Table => write_table(out, items),
        OutputFormat::Json => write_json(out, items),
        OutputFormat::Csv => write_csv(out, items),
    }
}

fn write_table<W: Write, T: TableDisplay>(out: &mut W, items: &[T]) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let headers = T::headers();
    let rows: Vec<Vec<String>> = items.iter().map(|i| i.row()).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let render = |cells: Vec<String>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = width)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    writeln!(
        out,
        "{}",
        render(headers.iter().map(|h| h.to_string()).collect())
    )?;
    for row in rows {
        writeln!(out, "{}", render(row))?;
    }
    Ok(())
}

fn write_json<W: Write, T: Serialize>(out: &mut W, items: &[T]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, items)?;
    writeln!(out)?;
    Ok(())
}

fn write_csv<W: Write, T: TableDisplay>(out: &mut W, items: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(T::headers())?;
    for item in items {
        writer.write_record(item.row())?;
    }
    writer.flush()?;
    Ok(())
}
