//! matchlog library crate
//!
//! Turns game server logs into persisted matches and player ratings:
//!
//! - [`ingest::context`] links events to their match and round in arrival order
//! - [`ingest::rating`] rates each player's match performance
//! - [`ingest::flush`] writes each reconciled match as one atomic batch
//! - [`ingest::Ingestor`] drives the pipeline for one log source
//!
//! Parsing lives in `matchlog-common` and persistence in `matchlog-storage`.

pub mod cli;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod output;
pub mod spool;
pub mod tracing_setup;

pub use ingest::context::{Anomaly, AnomalyKind, MatchContext, MatchTally, ReconciledMatch};
pub use ingest::flush::{FlushCoordinator, FlushError, FlushOutcome, RetrySummary};
pub use ingest::rating::{rate, RatingConfig};
pub use ingest::{IngestError, IngestReport, Ingestor, ParseStats};
