//! Statement helpers shared by single-call writes and multi-step transactions.
//!
//! Each helper runs against a `&mut SqliteConnection`, so the same SQL serves
//! a pooled connection and an open transaction:
//!
//! ```no_run
//! use umbrella_storage::{Database, transaction};
//! use umbrella_core::{Action, StudentId, UmbrellaStatus};
//! use chrono::Utc;
//!
//! # async fn example(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
//! let student = StudentId::new("2112345678")?;
//! let now = Utc::now();
//!
//! let mut tx = db.pool().begin().await?;
//! if transaction::insert_student(&mut tx, &student, UmbrellaStatus::Borrowed, now).await? {
//!     transaction::append_history(&mut tx, &student, Action::Borrow, now).await?;
//! }
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Dropping the transaction without committing rolls both writes back.

use crate::error::StorageResult;
use crate::models::HistoryRecord;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use umbrella_core::{Action, StudentId, UmbrellaStatus};

/// Insert a student row unless one exists. Returns whether a row was added.
pub async fn insert_student(
    conn: &mut SqliteConnection,
    student_id: &StudentId,
    status: UmbrellaStatus,
    at: DateTime<Utc>,
) -> StorageResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO students (student_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(student_id) DO NOTHING
        "#,
    )
    .bind(student_id.as_str())
    .bind(status.as_str())
    .bind(at)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move a student from `expected` to `status`. Returns whether the row
/// still held `expected`.
pub async fn update_status(
    conn: &mut SqliteConnection,
    student_id: &StudentId,
    expected: UmbrellaStatus,
    status: UmbrellaStatus,
    at: DateTime<Utc>,
) -> StorageResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE students
        SET status = ?, updated_at = ?
        WHERE student_id = ? AND status = ?
        "#,
    )
    .bind(status.as_str())
    .bind(at)
    .bind(student_id.as_str())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Append a history entry and return the stored row.
pub async fn append_history(
    conn: &mut SqliteConnection,
    student_id: &StudentId,
    action: Action,
    at: DateTime<Utc>,
) -> StorageResult<HistoryRecord> {
    let record = sqlx::query_as::<_, HistoryRecord>(
        r#"
        INSERT INTO history (student_id, action, timestamp)
        VALUES (?, ?, ?)
        RETURNING id, student_id, action, timestamp
        "#,
    )
    .bind(student_id.as_str())
    .bind(action.as_str())
    .bind(at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    fn sid(raw: &str) -> StudentId {
        StudentId::new(raw).unwrap()
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_uncommitted_writes_roll_back() {
        let db = Database::in_memory().await.unwrap();
        let id = sid("2112345678");
        let now = Utc::now();

        {
            let mut tx = db.pool().begin().await.unwrap();
            assert!(insert_student(&mut tx, &id, UmbrellaStatus::Borrowed, now).await.unwrap());
            append_history(&mut tx, &id, Action::Borrow, now).await.unwrap();
        }

        assert_eq!(count(&db, "students").await, 0);
        assert_eq!(count(&db, "history").await, 0);
    }

    #[tokio::test]
    async fn test_committed_writes_persist() {
        let db = Database::in_memory().await.unwrap();
        let id = sid("2112345678");
        let now = Utc::now();

        let mut tx = db.pool().begin().await.unwrap();
        insert_student(&mut tx, &id, UmbrellaStatus::Borrowed, now).await.unwrap();
        let record = append_history(&mut tx, &id, Action::Borrow, now).await.unwrap();
        tx.commit().await.unwrap();

        assert!(record.id > 0);
        assert_eq!(count(&db, "students").await, 1);
        assert_eq!(count(&db, "history").await, 1);
    }
}
