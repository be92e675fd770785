//! Metric counter helpers

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one input line by parse outcome (`event`, `ignored`, `malformed`)
pub fn record_line(outcome: &'static str) {
    counter!("matchlog_lines_total", "outcome" => outcome).increment(1);
}

/// Record a reconciliation anomaly
pub fn record_anomaly(kind: &'static str) {
    counter!("matchlog_anomalies_total", "kind" => kind).increment(1);
}

/// Record one match flush attempt
pub fn record_flush(status: &'static str, duration: Duration) {
    counter!("matchlog_flush_total", "status" => status).increment(1);
    histogram!("matchlog_flush_duration_seconds").record(duration.as_secs_f64());
}

/// Record snapshots of a backfilled match folded into current stats
pub fn record_backfill(players: usize) {
    counter!("matchlog_backfilled_snapshots_total").increment(players as u64);
}

/// Set the number of matches waiting for a flush retry
pub fn set_pending_flushes(count: usize) {
    gauge!("matchlog_flush_pending").set(count as f64);
}
