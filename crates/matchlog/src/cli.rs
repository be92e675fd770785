//! Command-line interface
//!
//! Every command opens the configured store, runs, and closes it again.
//! Configuration comes from `--config` (TOML), with `--database` overriding
//! the store URL.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use matchlog_storage::{create_storage, Storage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

use crate::config::{Config, DatabaseConfig};
use crate::ingest::flush::FlushCoordinator;
use crate::ingest::{IngestReport, Ingestor};
use crate::output::{print_items, HistoryEntry, IngestLine, MatchSummary, Ranked};
use crate::{metrics, spool};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "matchlog")]
#[command(about = "Match log ingestion and player ratings", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage URL, overrides [database] from the config file
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest server log files in order ("-" reads stdin)
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show players ranked by current rating
    Leaderboard {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show a player's archived snapshots, oldest first
    History {
        /// Stable player id, e.g. [U:1:1001]
        player: String,
    },
    /// List stored matches, newest first
    Matches {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Re-ingest the spool of matches that failed to flush
    Retry,
}

impl Cli {
    /// Effective configuration for this invocation
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(url) = &self.database {
            config.database = DatabaseConfig::from_url(url.clone());
            config.validate()?;
        }
        Ok(config)
    }
}

/// Run the parsed command line
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;

    let metrics = metrics::init(config.metrics.as_ref()).await?;

    let storage_config = config.database.storage_config()?;
    let storage = create_storage(&storage_config)
        .await
        .context("failed to open storage")?;

    let result = dispatch(&cli, &config, &storage).await;

    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }
    metrics.shutdown().await;
    result
}

async fn dispatch(cli: &Cli, config: &Config, storage: &Arc<dyn Storage>) -> Result<ExitCode> {
    match &cli.command {
        Commands::Ingest { files } => ingest(config, storage, files, cli.format).await,
        Commands::Retry => retry(config, storage, cli.format).await,
        Commands::Leaderboard { limit } => {
            let board = storage.leaderboard(*limit).await?;
            print_items(&Ranked::from_board(board), cli.format);
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { player } => {
            let history = storage.player_history(player).await?;
            if history.is_empty() {
                eprintln!("No snapshots for player {}", player);
                return Ok(ExitCode::FAILURE);
            }
            let entries: Vec<HistoryEntry> = history.into_iter().map(HistoryEntry::from).collect();
            print_items(&entries, cli.format);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Matches { limit } => {
            let matches = storage.list_matches(*limit).await?;
            let rows: Vec<MatchSummary> = matches.into_iter().map(MatchSummary::from).collect();
            print_items(&rows, cli.format);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn new_ingestor(config: &Config, storage: &Arc<dyn Storage>) -> Ingestor {
    let flusher = FlushCoordinator::new(
        Arc::clone(storage),
        config.rating.clone(),
        config.flush.timeout(),
    );
    Ingestor::new(config.source.name.clone(), flusher)
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn ingest(
    config: &Config,
    storage: &Arc<dyn Storage>,
    files: &[PathBuf],
    format: OutputFormat,
) -> Result<ExitCode> {
    let mut ingestor = new_ingestor(config, storage);
    let mut reports = Vec::new();

    for path in files {
        let reader = open_input(path).await?;
        let found = ingestor
            .ingest_reader(reader)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        info!(file = %path.display(), matches = found.len(), "file ingested");
        reports.extend(found);
    }

    finish(config, &mut ingestor, &reports, format, SpoolMode::Append).await
}

async fn retry(
    config: &Config,
    storage: &Arc<dyn Storage>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let path = config.flush.spool_path.clone();
    let lines = tokio::task::spawn_blocking(move || spool::read(&path)).await??;
    if lines.is_empty() {
        info!(spool = %config.flush.spool_path.display(), "spool is empty, nothing to retry");
        return Ok(ExitCode::SUCCESS);
    }

    let mut ingestor = new_ingestor(config, storage);
    let mut reports = Vec::new();
    for line in &lines {
        if let Some(report) = ingestor.ingest_line(line).await {
            reports.push(report);
        }
    }

    finish(config, &mut ingestor, &reports, format, SpoolMode::Replace).await
}

enum SpoolMode {
    Append,
    Replace,
}

/// Give failed flushes one more attempt, then spool what is still failing
async fn finish(
    config: &Config,
    ingestor: &mut Ingestor,
    reports: &[IngestReport],
    format: OutputFormat,
    mode: SpoolMode,
) -> Result<ExitCode> {
    if ingestor.flusher().pending_len() > 0 {
        match ingestor.flusher().retry_pending().await {
            Ok(summary) => info!(
                persisted = summary.persisted,
                duplicates = summary.duplicates,
                still_pending = summary.still_pending,
                "retried failed flushes"
            ),
            Err(e) => warn!(error = %e, "retry of failed flushes skipped"),
        }
    }

    let failed = ingestor.take_failed_segments();
    let spooled = failed.len();
    let path = config.flush.spool_path.clone();
    tokio::task::spawn_blocking(move || match mode {
        SpoolMode::Append => spool::append(&path, &failed).map(|_| ()),
        SpoolMode::Replace => spool::replace(&path, &failed),
    })
    .await??;

    let stats = ingestor.stats();
    let stray_anomalies = ingestor.take_stray_anomalies().len();
    info!(
        source = %ingestor.source(),
        lines = stats.lines,
        events = stats.events,
        ignored = stats.ignored,
        malformed = stats.malformed,
        matches = reports.len(),
        stray_anomalies,
        spooled,
        "ingest finished"
    );

    let rows: Vec<IngestLine> = reports.iter().map(IngestLine::from).collect();
    print_items(&rows, format);

    if spooled > 0 {
        warn!(
            spool = %config.flush.spool_path.display(),
            matches = spooled,
            "matches could not be stored and were spooled for `matchlog retry`"
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from(["matchlog", "ingest", "a.log", "b.log"]).unwrap();
        match cli.command {
            Commands::Ingest { files } => assert_eq!(files.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.format, OutputFormat::Table);
    }

    #[test]
    fn test_ingest_requires_files() {
        assert!(Cli::try_parse_from(["matchlog", "ingest"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "matchlog",
            "leaderboard",
            "--limit",
            "5",
            "--format",
            "json",
            "--database",
            "sqlite://:memory:",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Leaderboard { limit: Some(5) }));
        assert_eq!(cli.format, OutputFormat::Json);

        let config = cli.load_config().unwrap();
        assert_eq!(
            config.database.storage_url().unwrap(),
            "sqlite://:memory:"
        );
    }

    #[test]
    fn test_bad_database_override_rejected() {
        let cli =
            Cli::try_parse_from(["matchlog", "retry", "--database", "mysql://x"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_run_leaderboard_on_empty_store() {
        let cli = Cli::try_parse_from([
            "matchlog",
            "leaderboard",
            "--database",
            "sqlite://:memory:",
        ])
        .unwrap();
        assert_eq!(run(cli).await.unwrap(), ExitCode::SUCCESS);
    }
}
