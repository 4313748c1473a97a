use super::StatusStore;
use crate::connection::Database;
use crate::error::StorageResult;
use crate::models::{HistoryRecord, StudentRecord};
use crate::transaction;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use umbrella_core::{Action, StudentId, UmbrellaStatus};

/// SQLite implementation of [`StatusStore`].
#[derive(Debug, Clone)]
pub struct SqliteStatusStore {
    pool: SqlitePool,
}

impl SqliteStatusStore {
    /// Create a store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a store over a migrated [`Database`].
    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }
}

impl StatusStore for SqliteStatusStore {
    async fn find_student(&self, student_id: &StudentId) -> StorageResult<Option<StudentRecord>> {
        let student = sqlx::query_as::<_, StudentRecord>(
            r#"
            SELECT student_id, status, created_at, updated_at
            FROM students
            WHERE student_id = ?
            "#,
        )
        .bind(student_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn insert_student(
        &self,
        student_id: &StudentId,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut conn = self.pool.acquire().await?;
        transaction::insert_student(&mut conn, student_id, status, at).await
    }

    async fn update_status(
        &self,
        student_id: &StudentId,
        expected: UmbrellaStatus,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut conn = self.pool.acquire().await?;
        transaction::update_status(&mut conn, student_id, expected, status, at).await
    }

    async fn append_history(
        &self,
        student_id: &StudentId,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<HistoryRecord> {
        let mut conn = self.pool.acquire().await?;
        transaction::append_history(&mut conn, student_id, action, at).await
    }

    async fn record_transition(
        &self,
        student_id: &StudentId,
        prior: Option<UmbrellaStatus>,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<HistoryRecord>> {
        let target = action.resulting_status();
        let mut tx = self.pool.begin().await?;

        let written = match prior {
            None => transaction::insert_student(&mut tx, student_id, target, at).await?,
            Some(expected) => {
                transaction::update_status(&mut tx, student_id, expected, target, at).await?
            }
        };
        if !written {
            tx.rollback().await?;
            return Ok(None);
        }

        let record = transaction::append_history(&mut tx, student_id, action, at).await?;
        tx.commit().await?;
        Ok(Some(record))
    }

    async fn history_for_student(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> StorageResult<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, student_id, action, timestamp
            FROM history
            WHERE student_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(student_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn recent_history(&self, limit: u32) -> StorageResult<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, student_id, action, timestamp
            FROM history
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
