//! DuckDB backend test runner
//!
//! ```bash
//! cargo test -p matchlog-storage --features duckdb --test duckdb_backend
//! ```

#![cfg(feature = "duckdb")]

mod common;

use matchlog_storage::backends::duckdb::DuckDbStorage;
use matchlog_storage::{create_storage as open_storage, MatchStore, Storage, StorageConfig};

/// Create an initialized in-memory DuckDB storage for testing
async fn create_storage() -> DuckDbStorage {
    let storage = DuckDbStorage::new(":memory:")
        .await
        .expect("failed to create DuckDB storage");
    storage
        .initialize()
        .await
        .expect("failed to initialize DuckDB storage");
    storage
}

// ============================================================================
// Full Test Suite
// ============================================================================

#[tokio::test]
async fn duckdb_passes_all_storage_tests() {
    let storage = create_storage().await;
    common::run_all_tests(&storage).await;
}

#[tokio::test]
async fn duckdb_passes_match_store_tests() {
    let storage = create_storage().await;
    common::run_match_store_tests(&storage).await;
}

#[tokio::test]
async fn duckdb_passes_player_archive_tests() {
    let storage = create_storage().await;
    common::run_player_archive_tests(&storage).await;
}

// ============================================================================
// DuckDB-Specific Tests
// ============================================================================

#[tokio::test]
async fn duckdb_file_database_survives_reopen() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("matches.duckdb");
    let path = db_path.to_str().unwrap();

    let batch = common::sample_batch("de_dust2", common::at(42));
    let id = batch.record.id;
    {
        let storage = DuckDbStorage::new(path).await.unwrap();
        storage.initialize().await.unwrap();
        storage.persist_match(batch).await.unwrap();
        storage.close().await.unwrap();
    }

    let storage = DuckDbStorage::new(path).await.unwrap();
    storage.initialize().await.unwrap();
    assert_eq!(storage.get_match(id).await.unwrap().map, "de_dust2");
    assert_eq!(storage.load_events(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn duckdb_create_storage_from_url() {
    let config = StorageConfig::from_url("duckdb://:memory:").unwrap();
    let storage = open_storage(&config).await.expect("create_storage should succeed");
    storage
        .health_check()
        .await
        .expect("health check should succeed");
    assert_eq!(storage.count_matches().await.unwrap(), 0);
}

#[tokio::test]
async fn duckdb_close_is_idempotent() {
    let storage = create_storage().await;
    storage.close().await.expect("first close should succeed");
    storage.close().await.expect("second close should succeed");
}

#[tokio::test]
async fn duckdb_initialize_is_idempotent() {
    let storage = DuckDbStorage::new(":memory:")
        .await
        .expect("failed to create storage");
    storage.initialize().await.unwrap();
    storage.initialize().await.unwrap();
    storage
        .health_check()
        .await
        .expect("health check should succeed after double init");
}
