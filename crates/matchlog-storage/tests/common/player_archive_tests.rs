//! PlayerArchive trait test suite

use matchlog_storage::{MatchId, PlayerSnapshot, Storage, StorageError};
use ulid::Ulid;

use super::{at, stats};

/// Run all PlayerArchive tests
pub async fn run_all<S: Storage>(storage: &S) {
    test_unknown_player_has_no_stats(storage).await;
    test_archive_and_current_stats(storage).await;
    test_duplicate_snapshot_rejected(storage).await;
    test_history_is_append_only(storage).await;
    test_current_stats_tie_break(storage).await;
    test_leaderboard_uses_latest_snapshot(storage).await;
}

fn unique_player() -> String {
    format!("[U:1:{}]", Ulid::new())
}

fn snapshot(player_id: &str, secs: i64, rating: f64, matches_played: u32) -> PlayerSnapshot {
    PlayerSnapshot {
        match_id: MatchId::new(),
        recorded_at: at(secs),
        stats: stats(player_id, "Player", rating, matches_played),
    }
}

pub async fn test_unknown_player_has_no_stats<S: Storage>(storage: &S) {
    assert_eq!(storage.current_stats(&unique_player()).await.unwrap(), None);
    assert_eq!(storage.latest_snapshot(&unique_player()).await.unwrap(), None);
    assert!(storage
        .player_history(&unique_player())
        .await
        .unwrap()
        .is_empty());
}

pub async fn test_archive_and_current_stats<S: Storage>(storage: &S) {
    let id = unique_player();
    let snap = snapshot(&id, 10, 1005.0, 1);

    storage
        .archive_player_snapshot(snap.clone())
        .await
        .expect("archive should succeed");

    let current = storage.current_stats(&id).await.unwrap().unwrap();
    assert_eq!(current, snap.stats);
    assert_eq!(current.kd_ratio(), 2.0);
    assert_eq!(current.adr(), 75.0);
}

pub async fn test_duplicate_snapshot_rejected<S: Storage>(storage: &S) {
    let id = unique_player();
    let snap = snapshot(&id, 20, 990.0, 1);
    storage.archive_player_snapshot(snap.clone()).await.unwrap();

    let mut again = snap.clone();
    again.stats.rating = 2000.0;
    let result = storage.archive_player_snapshot(again).await;
    assert!(
        matches!(result, Err(StorageError::DuplicateSnapshot { .. })),
        "should return DuplicateSnapshot, got: {:?}",
        result
    );

    // The first snapshot is untouched
    let current = storage.current_stats(&id).await.unwrap().unwrap();
    assert_eq!(current.rating, 990.0);
}

pub async fn test_history_is_append_only<S: Storage>(storage: &S) {
    let id = unique_player();
    // Archived out of order on purpose
    for (secs, rating, n) in [(300, 1030.0, 3), (100, 1010.0, 1), (200, 1020.0, 2)] {
        storage
            .archive_player_snapshot(snapshot(&id, secs, rating, n))
            .await
            .unwrap();
    }

    let history = storage.player_history(&id).await.unwrap();
    let ratings: Vec<f64> = history.iter().map(|s| s.stats.rating).collect();
    assert_eq!(ratings, vec![1010.0, 1020.0, 1030.0]);

    let current = storage.current_stats(&id).await.unwrap().unwrap();
    assert_eq!(current.rating, 1030.0);
    assert_eq!(current.matches_played, 3);
}

pub async fn test_current_stats_tie_break<S: Storage>(storage: &S) {
    let id = unique_player();
    storage
        .archive_player_snapshot(snapshot(&id, 400, 1040.0, 5))
        .await
        .unwrap();
    storage
        .archive_player_snapshot(snapshot(&id, 400, 1039.0, 4))
        .await
        .unwrap();

    let current = storage.current_stats(&id).await.unwrap().unwrap();
    assert_eq!(current.matches_played, 5);

    let latest = storage.latest_snapshot(&id).await.unwrap().unwrap();
    assert_eq!(latest.recorded_at, at(400));
    assert_eq!(latest.stats, current);
}

pub async fn test_leaderboard_uses_latest_snapshot<S: Storage>(storage: &S) {
    let strong = unique_player();
    let fading = unique_player();

    storage
        .archive_player_snapshot(snapshot(&strong, 500, 1100.0, 1))
        .await
        .unwrap();
    storage
        .archive_player_snapshot(snapshot(&fading, 500, 1200.0, 1))
        .await
        .unwrap();
    // A later, lower rating replaces the earlier peak
    storage
        .archive_player_snapshot(snapshot(&fading, 600, 900.0, 2))
        .await
        .unwrap();

    let board = storage.leaderboard(None).await.unwrap();
    let ours: Vec<_> = board
        .iter()
        .filter(|s| s.player_id == strong || s.player_id == fading)
        .collect();

    assert_eq!(ours.len(), 2, "one row per player");
    assert_eq!(ours[0].player_id, strong);
    assert_eq!(ours[1].player_id, fading);
    assert_eq!(ours[1].rating, 900.0);

    let ratings: Vec<f64> = board.iter().map(|s| s.rating).collect();
    assert!(ratings.windows(2).all(|w| w[0] >= w[1]));

    let top = storage.leaderboard(Some(1)).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].rating, ratings[0]);
}
