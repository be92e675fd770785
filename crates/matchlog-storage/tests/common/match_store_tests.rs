//! MatchStore trait test suite

use chrono::Duration;
use matchlog_common::EventKind;
use matchlog_storage::{MatchId, PersistOutcome, Storage, StorageError};
use ulid::Ulid;

use super::{at, sample_batch, stats, unique_map};

/// Run all MatchStore tests
pub async fn run_all<S: Storage>(storage: &S) {
    test_persist_and_get_match(storage).await;
    test_get_nonexistent_match(storage).await;
    test_children_round_trip(storage).await;
    test_duplicate_match_is_not_written(storage).await;
    test_find_duplicate(storage).await;
    test_same_time_different_map_is_not_duplicate(storage).await;
    test_failed_batch_writes_nothing(storage).await;
    test_list_matches_newest_first(storage).await;
    test_batch_with_snapshots(storage).await;
}

pub async fn test_persist_and_get_match<S: Storage>(storage: &S) {
    let batch = sample_batch(&unique_map("de_dust2"), at(100));
    let expected = batch.record.clone();

    let outcome = storage
        .persist_match(batch)
        .await
        .expect("persist_match should succeed");
    assert_eq!(outcome, PersistOutcome::Inserted(expected.id));

    let stored = storage
        .get_match(expected.id)
        .await
        .expect("get_match should succeed");
    assert_eq!(stored, expected);
    assert_eq!(stored.expected_rounds(), 2);
}

pub async fn test_get_nonexistent_match<S: Storage>(storage: &S) {
    let id = MatchId::new();
    let result = storage.get_match(id).await;
    assert!(
        matches!(result, Err(StorageError::MatchNotFound(missing)) if missing == id),
        "should return MatchNotFound, got: {:?}",
        result
    );
}

pub async fn test_children_round_trip<S: Storage>(storage: &S) {
    let batch = sample_batch(&unique_map("de_inferno"), at(200));
    let id = batch.record.id;
    let expected_rounds = batch.rounds.clone();
    let expected_events = batch.events.clone();
    let expected_accolades = batch.accolades.clone();

    storage.persist_match(batch).await.unwrap();

    let rounds = storage.load_rounds(id).await.unwrap();
    assert_eq!(rounds, expected_rounds);

    let events = storage.load_events(id).await.unwrap();
    assert_eq!(events, expected_events);
    assert!(matches!(events[0].kind, EventKind::Kill { headshot: true, .. }));
    assert!(events.last().unwrap().orphan);
    assert_eq!(events.last().unwrap().round_id, None);

    let accolades = storage.load_accolades(id).await.unwrap();
    assert_eq!(accolades, expected_accolades);
    assert_eq!(accolades[0].awarded_at, at(200));
}

pub async fn test_duplicate_match_is_not_written<S: Storage>(storage: &S) {
    let map = unique_map("de_mirage");
    let first = sample_batch(&map, at(300));
    let first_id = first.record.id;
    storage.persist_match(first).await.unwrap();

    let before = storage.count_matches().await.unwrap();

    // Same end time and map, fresh ids everywhere
    let second = sample_batch(&map, at(300));
    let second_id = second.record.id;
    let outcome = storage.persist_match(second).await.unwrap();

    assert_eq!(outcome, PersistOutcome::Duplicate(first_id));
    assert_eq!(storage.count_matches().await.unwrap(), before);
    assert!(storage.load_events(second_id).await.unwrap().is_empty());
}

pub async fn test_find_duplicate<S: Storage>(storage: &S) {
    let map = unique_map("de_nuke");
    assert_eq!(storage.find_duplicate(at(400), &map).await.unwrap(), None);

    let batch = sample_batch(&map, at(400));
    let id = batch.record.id;
    storage.persist_match(batch).await.unwrap();

    assert_eq!(
        storage.find_duplicate(at(400), &map).await.unwrap(),
        Some(id)
    );
    assert_eq!(storage.find_duplicate(at(401), &map).await.unwrap(), None);
}

pub async fn test_same_time_different_map_is_not_duplicate<S: Storage>(storage: &S) {
    let a = sample_batch(&unique_map("de_train"), at(500));
    let b = sample_batch(&unique_map("de_vertigo"), at(500));
    let b_id = b.record.id;

    storage.persist_match(a).await.unwrap();
    assert_eq!(
        storage.persist_match(b).await.unwrap(),
        PersistOutcome::Inserted(b_id)
    );
}

pub async fn test_failed_batch_writes_nothing<S: Storage>(storage: &S) {
    let map = unique_map("de_overpass");
    let mut batch = sample_batch(&map, at(600));
    let id = batch.record.id;

    // Two events with the same sequence violate UNIQUE(match_id, sequence)
    let mut clash = batch.events[0].clone();
    clash.id = Ulid::new();
    batch.events.push(clash);

    let before = storage.count_matches().await.unwrap();
    let result = storage.persist_match(batch).await;
    assert!(result.is_err(), "conflicting batch should fail");

    assert_eq!(storage.count_matches().await.unwrap(), before);
    assert!(matches!(
        storage.get_match(id).await,
        Err(StorageError::MatchNotFound(_))
    ));
    assert!(storage.load_rounds(id).await.unwrap().is_empty());
    assert_eq!(storage.find_duplicate(at(600), &map).await.unwrap(), None);
}

pub async fn test_list_matches_newest_first<S: Storage>(storage: &S) {
    let newest = at(1_000_000);
    for offset in [3, 1, 2] {
        let batch = sample_batch(&unique_map("de_ancient"), newest - Duration::seconds(offset));
        storage.persist_match(batch).await.unwrap();
    }

    let listed = storage.list_matches(Some(3)).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].ended_at, newest - Duration::seconds(1));
    assert_eq!(listed[1].ended_at, newest - Duration::seconds(2));
    assert_eq!(listed[2].ended_at, newest - Duration::seconds(3));

    let all = storage.list_matches(None).await.unwrap();
    assert_eq!(all.len() as i64, storage.count_matches().await.unwrap());
}

pub async fn test_batch_with_snapshots<S: Storage>(storage: &S) {
    let player_id = format!("[U:1:{}]", Ulid::new());
    let mut batch = sample_batch(&unique_map("de_anubis"), at(700));
    let match_id = batch.record.id;
    let snapshot = matchlog_storage::PlayerSnapshot {
        match_id,
        recorded_at: at(700),
        stats: stats(&player_id, "Carol", 1012.5, 1),
    };
    batch.snapshots.push(snapshot.clone());

    storage.persist_match(batch).await.unwrap();

    let current = storage.current_stats(&player_id).await.unwrap();
    assert_eq!(current, Some(snapshot.stats));
}
