/// Concurrent guard tests
///
/// Racing writers against the row locks of the in-memory store.
/// Run with: cargo test --test concurrent_guard_tests
mod common;

use common::*;
use futures::future::join_all;
use rowguard::{DbError, ErrorKind, MutationScope, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_racing_updates_with_same_version_one_wins() {
    let (db, table) = seeded_db();
    let registry = Arc::new(guarded_registry());
    let executor = Arc::new(table_executor());
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for title in ["from A", "from B"] {
        let db = db.clone();
        let table = table.clone();
        let registry = registry.clone();
        let executor = executor.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = db.begin();
            barrier.wait().await;
            let result = registry
                .resolve(
                    &mut tx,
                    &MutationScope::update(table),
                    &update_request(1, V1, title),
                    executor.as_ref(),
                )
                .await;
            // Hold the lock a moment so the loser is certainly waiting
            tokio::time::sleep(Duration::from_millis(20)).await;
            match result {
                Ok(_) => tx.commit().map(|_| title),
                Err(err) => {
                    tx.rollback().unwrap();
                    Err(err)
                }
            }
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(title) => winners.push(title),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Conflict);
                conflicts += 1;
            }
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 1);
    assert_eq!(executor.calls(), 1);
    assert_eq!(
        stored_post(&db, &table, 1).unwrap()[1],
        Value::from(winners[0])
    );
}

#[tokio::test]
async fn test_waiter_sees_conflict_after_holder_commits() {
    let (db, table) = seeded_db();
    let registry = Arc::new(guarded_registry());
    let executor = Arc::new(table_executor());

    let mut holder = db.begin();
    registry
        .resolve(
            &mut holder,
            &MutationScope::update(table.clone()),
            &update_request(2, V1, "holder"),
            executor.as_ref(),
        )
        .await
        .unwrap();
    assert_eq!(holder.held_lock_count(), 1);

    let waiter = {
        let db = db.clone();
        let table = table.clone();
        let registry = registry.clone();
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut tx = db.begin();
            registry
                .resolve(
                    &mut tx,
                    &MutationScope::delete(table),
                    &delete_request(2, V1),
                    executor.as_ref(),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    holder.commit().unwrap();

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert_eq!(executor.calls(), 1);
    assert_eq!(stored_post(&db, &table, 2).unwrap()[1], Value::from("holder"));
}

#[tokio::test]
async fn test_waiter_proceeds_after_holder_rolls_back() {
    let (db, table) = seeded_db();
    let registry = Arc::new(guarded_registry());
    let executor = Arc::new(table_executor());

    let mut holder = db.begin();
    registry
        .resolve(
            &mut holder,
            &MutationScope::update(table.clone()),
            &update_request(1, V1, "abandoned"),
            executor.as_ref(),
        )
        .await
        .unwrap();

    let waiter = {
        let db = db.clone();
        let table = table.clone();
        let registry = registry.clone();
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut tx = db.begin();
            let result = registry
                .resolve(
                    &mut tx,
                    &MutationScope::update(table),
                    &update_request(1, V1, "kept"),
                    executor.as_ref(),
                )
                .await;
            tx.commit().unwrap();
            result
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    holder.rollback().unwrap();

    waiter.await.unwrap().unwrap();
    assert_eq!(executor.calls(), 2);
    assert_eq!(stored_post(&db, &table, 1).unwrap()[1], Value::from("kept"));
}

#[tokio::test]
async fn test_waiter_queues_behind_uncommitted_delete() {
    let (db, table) = seeded_db();
    let registry = Arc::new(guarded_registry());
    let executor = Arc::new(table_executor());

    let mut holder = db.begin();
    registry
        .resolve(
            &mut holder,
            &MutationScope::delete(table.clone()),
            &delete_request(1, V1),
            executor.as_ref(),
        )
        .await
        .unwrap();
    assert!(stored_post(&db, &table, 1).is_none());

    let waiter = {
        let db = db.clone();
        let table = table.clone();
        let registry = registry.clone();
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut tx = db.begin();
            let result = registry
                .resolve(
                    &mut tx,
                    &MutationScope::update(table),
                    &update_request(1, V1, "kept"),
                    executor.as_ref(),
                )
                .await;
            if result.is_ok() {
                tx.commit().unwrap();
            }
            result
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    holder.rollback().unwrap();

    waiter.await.unwrap().unwrap();
    assert_eq!(executor.calls(), 2);
    assert_eq!(stored_post(&db, &table, 1).unwrap()[1], Value::from("kept"));
}

#[tokio::test]
async fn test_waiter_sees_conflict_after_delete_commits() {
    let (db, table) = seeded_db();
    let registry = Arc::new(guarded_registry());
    let executor = Arc::new(table_executor());

    let mut holder = db.begin();
    registry
        .resolve(
            &mut holder,
            &MutationScope::delete(table.clone()),
            &delete_request(2, V1),
            executor.as_ref(),
        )
        .await
        .unwrap();

    let waiter = {
        let db = db.clone();
        let table = table.clone();
        let registry = registry.clone();
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut tx = db.begin();
            registry
                .resolve(
                    &mut tx,
                    &MutationScope::update(table),
                    &update_request(2, V1, "too late"),
                    executor.as_ref(),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    holder.commit().unwrap();

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert_eq!(executor.calls(), 1);
    assert!(stored_post(&db, &table, 2).is_none());
}

#[tokio::test]
async fn test_lock_timeout_is_reported_as_transport_error() {
    let (db, table) = seeded_db_with(short_lock_timeout());
    let registry = guarded_registry();
    let executor = table_executor();

    let mut holder = db.begin();
    registry
        .resolve(
            &mut holder,
            &MutationScope::update(table.clone()),
            &update_request(3, V2, "holder"),
            &executor,
        )
        .await
        .unwrap();

    let mut blocked = db.begin();
    let err = registry
        .resolve(
            &mut blocked,
            &MutationScope::update(table.clone()),
            &update_request(3, V2, "blocked"),
            &executor,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::LockTimeout(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!err.is_conflict());
    assert_eq!(executor.calls(), 1);
    assert_eq!(blocked.held_lock_count(), 0);
}

#[tokio::test]
async fn test_rollback_restores_rows_and_releases_locks() {
    let (db, table) = seeded_db_with(short_lock_timeout());
    let registry = guarded_registry();
    let executor = table_executor();

    let mut tx = db.begin();
    registry
        .resolve(
            &mut tx,
            &MutationScope::delete(table.clone()),
            &delete_request(3, V2),
            &executor,
        )
        .await
        .unwrap();
    assert!(stored_post(&db, &table, 3).is_none());
    tx.rollback().unwrap();

    let restored = stored_post(&db, &table, 3).unwrap();
    assert_eq!(restored[1], Value::from("third"));
    assert_eq!(restored[2], Value::Timestamp(ts(V2)));

    // Lock is free again and the version is intact
    let mut tx = db.begin();
    registry
        .resolve(
            &mut tx,
            &MutationScope::update(table.clone()),
            &update_request(3, V2, "after rollback"),
            &executor,
        )
        .await
        .unwrap();
    tx.commit().unwrap();
    assert_eq!(
        stored_post(&db, &table, 3).unwrap()[1],
        Value::from("after rollback")
    );
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let (db, table) = seeded_db();
    let registry = guarded_registry();
    let executor = table_executor();

    {
        let mut tx = db.begin();
        registry
            .resolve(
                &mut tx,
                &MutationScope::update(table.clone()),
                &update_request(2, V1, "never committed"),
                &executor,
            )
            .await
            .unwrap();
    }

    let row = stored_post(&db, &table, 2).unwrap();
    assert_eq!(row[1], Value::from("second"));
    assert_eq!(row[2], Value::Timestamp(ts(V1)));
}

#[tokio::test]
async fn test_different_rows_do_not_block_each_other() {
    let (db, table) = seeded_db_with(short_lock_timeout());
    let registry = guarded_registry();
    let executor = table_executor();

    let mut first = db.begin();
    let mut second = db.begin();
    registry
        .resolve(
            &mut first,
            &MutationScope::update(table.clone()),
            &update_request(1, V1, "one"),
            &executor,
        )
        .await
        .unwrap();
    registry
        .resolve(
            &mut second,
            &MutationScope::update(table.clone()),
            &update_request(2, V1, "two"),
            &executor,
        )
        .await
        .unwrap();

    second.commit().unwrap();
    first.commit().unwrap();
    assert_eq!(executor.calls(), 2);
    assert_eq!(stored_post(&db, &table, 1).unwrap()[1], Value::from("one"));
    assert_eq!(stored_post(&db, &table, 2).unwrap()[1], Value::from("two"));
}

#[tokio::test]
async fn test_many_stale_deleters_only_first_succeeds() {
    let (db, table) = seeded_db();
    let registry = Arc::new(guarded_registry());
    let executor = Arc::new(table_executor());

    let handles = (0..8).map(|_| {
        let db = db.clone();
        let table = table.clone();
        let registry = registry.clone();
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut tx = db.begin();
            let result = registry
                .resolve(
                    &mut tx,
                    &MutationScope::delete(table),
                    &delete_request(3, V2),
                    executor.as_ref(),
                )
                .await;
            if result.is_ok() {
                tx.commit().unwrap();
            }
            result
        })
    });

    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let succeeded = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(DbError::is_conflict)
    );
    assert!(stored_post(&db, &table, 3).is_none());
}
