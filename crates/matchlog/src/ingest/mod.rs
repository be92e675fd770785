//! Ingest pipeline: log lines in, persisted matches out
//!
//! One [`Ingestor`] per log source. It classifies each line, feeds the events
//! to its [`MatchContext`] in arrival order and hands every reconciled match
//! to the shared [`FlushCoordinator`].

pub mod context;
pub mod flush;
pub mod rating;

use matchlog_common::classify;
use matchlog_storage::MatchId;
use std::collections::HashSet;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::metrics::counters;
use context::{Anomaly, MatchContext, ReconciledMatch};
use flush::{FlushCoordinator, FlushError, FlushOutcome};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read log input: {0}")]
    Io(#[from] std::io::Error),
}

/// Line counters for one ingestor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: u64,
    pub events: u64,
    /// Lines outside the grammar
    pub ignored: u64,
    /// Recognized lines whose fields could not be extracted
    pub malformed: u64,
}

/// What happened to one completed match segment
#[derive(Debug)]
pub struct IngestReport {
    pub match_id: MatchId,
    pub map: String,
    pub round_count: u32,
    pub event_count: usize,
    pub anomalies: Vec<Anomaly>,
    pub flush: Result<FlushOutcome, FlushError>,
}

impl IngestReport {
    pub fn is_persisted(&self) -> bool {
        matches!(self.flush, Ok(FlushOutcome::Persisted { .. }))
    }
}

/// Raw lines of a segment whose flush failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSegment {
    pub match_id: MatchId,
    pub lines: Vec<String>,
}

pub struct Ingestor {
    context: MatchContext,
    stats: ParseStats,
    flusher: FlushCoordinator,
    /// Raw lines since the last completed segment
    segment: Vec<String>,
    failed: Vec<FailedSegment>,
}

impl Ingestor {
    pub fn new(source: impl Into<String>, flusher: FlushCoordinator) -> Self {
        Self {
            context: MatchContext::new(source),
            stats: ParseStats::default(),
            flusher,
            segment: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        self.context.source()
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn flusher(&self) -> &FlushCoordinator {
        &self.flusher
    }

    /// Anomalies raised outside any match, drained
    pub fn take_stray_anomalies(&mut self) -> Vec<Anomaly> {
        self.context.take_stray_anomalies()
    }

    /// Segments whose matches are still in the coordinator's retry queue
    ///
    /// Segments written by a later retry are dropped from the list.
    pub fn take_failed_segments(&mut self) -> Vec<FailedSegment> {
        let pending: HashSet<MatchId> = self.flusher.pending_ids().into_iter().collect();
        std::mem::take(&mut self.failed)
            .into_iter()
            .filter(|s| pending.contains(&s.match_id))
            .collect()
    }

    /// Discard the match being assembled without writing anything
    pub fn abort(&mut self) {
        self.context.abort();
        self.segment.clear();
    }

    /// Feed one raw line; returns a report when it completes a match
    pub async fn ingest_line(&mut self, line: &str) -> Option<IngestReport> {
        self.stats.lines += 1;

        let event = match classify(line) {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.stats.ignored += 1;
                counters::record_line("ignored");
                return None;
            }
            Err(e) => {
                self.stats.malformed += 1;
                counters::record_line("malformed");
                warn!(source = %self.source(), line = self.stats.lines, error = %e, "malformed log line dropped");
                return None;
            }
        };

        self.stats.events += 1;
        counters::record_line("event");
        self.segment.push(line.trim_end_matches(['\r', '\n']).to_string());

        let reconciled = self.context.apply(event)?;
        let lines = std::mem::take(&mut self.segment);
        Some(self.complete(reconciled, lines).await)
    }

    /// Feed every line of a reader, in order
    pub async fn ingest_reader<R>(&mut self, reader: R) -> Result<Vec<IngestReport>, IngestError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut reports = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if let Some(report) = self.ingest_line(&line).await {
                reports.push(report);
            }
        }

        if self.context.is_open() {
            debug!(
                source = %self.source(),
                buffered = self.segment.len(),
                "input ended inside an open match"
            );
        }
        Ok(reports)
    }

    async fn complete(&mut self, reconciled: ReconciledMatch, lines: Vec<String>) -> IngestReport {
        let match_id = reconciled.record.id;
        let map = reconciled.record.map.clone();
        let round_count = reconciled.record.round_count;
        let event_count = reconciled.events.len();
        let anomalies = reconciled.anomalies.clone();

        let flush = self.flusher.flush(reconciled).await;
        if flush.is_err() {
            self.failed.push(FailedSegment { match_id, lines });
        }

        IngestReport {
            match_id,
            map,
            round_count,
            event_count,
            anomalies,
            flush,
        }
    }
}
