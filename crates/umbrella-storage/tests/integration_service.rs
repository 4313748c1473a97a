//! End-to-end lending scenarios against the SQLite backend.

use std::sync::Arc;
use tokio::sync::Barrier;
use umbrella_core::{Action, StudentId, UmbrellaStatus};
use umbrella_storage::{
    Database, DatabaseConfig, SqliteStatusStore, StorageError, TransitionStatus, UmbrellaService,
};

async fn sqlite_service() -> UmbrellaService {
    let db = Database::in_memory().await.unwrap();
    UmbrellaService::new(SqliteStatusStore::from_database(&db))
}

fn sid(raw: &str) -> StudentId {
    StudentId::new(raw).unwrap()
}

#[tokio::test]
async fn test_borrow_return_cycle() {
    let service = sqlite_service().await;
    let id = sid("2112345678");

    let borrowed = service.borrow(&id).await.unwrap();
    assert_eq!(borrowed.status, TransitionStatus::Borrowed);

    let again = service.borrow(&id).await.unwrap();
    assert_eq!(again.status, TransitionStatus::AlreadyBorrowed);

    let returned = service.return_umbrella(&id).await.unwrap();
    assert_eq!(returned.status, TransitionStatus::Returned);

    let status = service.check_status(&id).await.unwrap();
    assert_eq!(status.status, Some(UmbrellaStatus::Returned));
    assert!(!status.has_umbrella);

    let history = service.student_history(&id, 10).await.unwrap();
    let actions: Vec<_> = history.iter().map(|h| h.get_action().unwrap()).collect();
    assert_eq!(actions, vec![Action::Return, Action::Borrow]);
}

#[tokio::test]
async fn test_history_limits() {
    let service = sqlite_service().await;
    let id = sid("2112345678");

    for _ in 0..3 {
        service.borrow(&id).await.unwrap();
        service.return_umbrella(&id).await.unwrap();
    }
    service.borrow(&sid("2100000000")).await.unwrap();

    assert_eq!(service.student_history(&id, 10).await.unwrap().len(), 6);
    assert_eq!(service.student_history(&id, 4).await.unwrap().len(), 4);

    let recent = service.recent_activity(20).await.unwrap();
    assert_eq!(recent.len(), 7);
    assert_eq!(recent[0].student_id, "2100000000");
}

#[tokio::test]
async fn test_concurrent_borrows_lend_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("umbrella.db");
    let db = Database::new(DatabaseConfig::new(path.clone()).pool_size(4))
        .await
        .unwrap();
    let service = UmbrellaService::new(SqliteStatusStore::from_database(&db));
    let id = sid("2112345678");

    const CONTENDERS: usize = 4;
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            let id = id.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                service.borrow(&id).await
            })
        })
        .collect();

    let mut lent = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) if outcome.success => lent += 1,
            Ok(outcome) => assert_eq!(outcome.status, TransitionStatus::AlreadyBorrowed),
            Err(StorageError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected store error: {other}"),
        }
    }

    assert_eq!(lent, 1);
    assert_eq!(service.student_history(&id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_history_write_keeps_prior_status() {
    let db = Database::in_memory().await.unwrap();
    let service = UmbrellaService::new(SqliteStatusStore::from_database(&db));
    let returning = sid("2100000001");
    service.borrow(&returning).await.unwrap();

    sqlx::query("DROP TABLE history")
        .execute(db.pool())
        .await
        .unwrap();

    let newcomer = sid("2112345678");
    let err = service.borrow(&newcomer).await.unwrap_err();
    assert!(matches!(err, StorageError::Database(_)));
    let status = service.check_status(&newcomer).await.unwrap();
    assert!(!status.exists, "no row without its history entry");

    service.return_umbrella(&returning).await.unwrap_err();
    let status = service.check_status(&returning).await.unwrap();
    assert_eq!(status.status, Some(UmbrellaStatus::Borrowed));
}
