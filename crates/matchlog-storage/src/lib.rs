//! Storage layer for matchlog
//!
//! Reconciled matches are persisted as one atomic batch (match row, rounds,
//! events, accolades and the player snapshots derived from them). Player
//! stats are append-only snapshots; the newest snapshot is the current view.
//!
//! # Supported Backends
//!
//! - **SQLite** (feature: `sqlite`, default) - Lightweight embedded database
//! - **DuckDB** (feature: `duckdb`) - Embedded analytics database
//!
//! # Architecture
//!
//! All backends implement the same traits:
//! - [`MatchStore`] - Atomic match batches with duplicate detection, history reads
//! - [`PlayerArchive`] - Player snapshots, current stats and the leaderboard
//! - [`Storage`] - Lifecycle management (initialize, health check, close)
//!
//! # Examples
//!
//! ```no_run
//! use matchlog_storage::{create_storage, StorageConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // In-memory for testing
//! let config = StorageConfig::from_url("sqlite://:memory:")?;
//! let storage = create_storage(&config).await?;
//!
//! // File-based for production
//! let config = StorageConfig::from_url("sqlite:///var/lib/matchlog/matches.sqlite")?;
//! let storage = create_storage(&config).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod traits;
mod types;

pub mod backends;

// Re-exports
pub use config::{BackendType, ConfigError, StorageConfig};
pub use error::StorageError;
pub use traits::{MatchStore, PlayerArchive, Storage};
pub use types::{
    AccoladeRecord, EventRecord, MatchBatch, MatchId, MatchRecord, PersistOutcome, PlayerSnapshot,
    PlayerStats, RoundId, RoundRecord,
};

/// Create storage from configuration
///
/// Opens the configured backend and initializes its schema.
///
/// # Errors
///
/// Returns `StorageError::InvalidConnectionString` if the backend type
/// is not compiled in (missing feature flag).
pub async fn create_storage(
    config: &StorageConfig,
) -> Result<std::sync::Arc<dyn Storage>, StorageError> {
    let storage: std::sync::Arc<dyn Storage> = match config.backend {
        #[cfg(feature = "duckdb")]
        BackendType::DuckDb => std::sync::Arc::new(
            backends::duckdb::DuckDbStorage::new(&config.connection_string).await?,
        ),
        #[cfg(not(feature = "duckdb"))]
        BackendType::DuckDb => {
            return Err(StorageError::InvalidConnectionString(
                "DuckDB backend not compiled in (enable 'duckdb' feature)".into(),
            ))
        }
        #[cfg(feature = "sqlite")]
        BackendType::Sqlite => {
            std::sync::Arc::new(backends::sqlite::SqliteStorage::from_config(config).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        BackendType::Sqlite => {
            return Err(StorageError::InvalidConnectionString(
                "SQLite backend not compiled in (enable 'sqlite' feature)".into(),
            ))
        }
    };

    storage.initialize().await?;
    tracing::debug!(backend = ?config.backend, "storage initialized");
    Ok(storage)
}
