//! Process-local store for tests and demos.
//!
//! Besides the table semantics it counts calls and can be told to fail or
//! to lose conditional writes, so pipeline tests can observe exactly what
//! the service asked of the store.

use super::StatusStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{HistoryRecord, StudentRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use umbrella_core::{Action, StudentId, UmbrellaStatus};

/// In-memory implementation of [`StatusStore`].
///
/// Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<Tables>,
    calls: AtomicU32,
    failing_calls: AtomicU32,
    lost_writes: AtomicU32,
}

#[derive(Debug, Default)]
struct Tables {
    students: HashMap<String, StudentRecord>,
    history: Vec<HistoryRecord>,
    next_history_id: i64,
}

impl MemoryStatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of store calls made so far.
    pub fn calls(&self) -> u32 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` calls fail with an internal error.
    pub fn fail_next_calls(&self, count: u32) {
        self.inner.failing_calls.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` conditional writes report that a concurrent
    /// writer changed the row first.
    pub fn lose_next_writes(&self, count: u32) {
        self.inner.lost_writes.store(count, Ordering::SeqCst);
    }

    /// Number of history rows.
    pub fn history_len(&self) -> usize {
        self.tables().history.len()
    }

    /// Seed a student row directly, bypassing call accounting.
    pub fn seed_student(&self, student_id: &StudentId, status: UmbrellaStatus) {
        let now = Utc::now();
        self.tables().students.insert(
            student_id.to_string(),
            StudentRecord {
                student_id: student_id.to_string(),
                status: status.as_str().to_string(),
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.inner
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, operation: &str) -> StorageResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.inner.failing_calls) {
            return Err(StorageError::Internal(format!(
                "injected failure in {}",
                operation
            )));
        }
        Ok(())
    }

    fn write_lost(&self) -> bool {
        take_one(&self.inner.lost_writes)
    }
}

impl Tables {
    fn push_history(
        &mut self,
        student_id: &StudentId,
        action: Action,
        at: DateTime<Utc>,
    ) -> HistoryRecord {
        self.next_history_id += 1;
        let record = HistoryRecord {
            id: self.next_history_id,
            student_id: student_id.to_string(),
            action: action.as_str().to_string(),
            timestamp: at,
        };
        self.history.push(record.clone());
        record
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

impl StatusStore for MemoryStatusStore {
    async fn find_student(&self, student_id: &StudentId) -> StorageResult<Option<StudentRecord>> {
        self.enter("find_student")?;
        Ok(self.tables().students.get(student_id.as_str()).cloned())
    }

    async fn insert_student(
        &self,
        student_id: &StudentId,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.enter("insert_student")?;
        if self.write_lost() {
            return Ok(false);
        }

        let mut tables = self.tables();
        if tables.students.contains_key(student_id.as_str()) {
            return Ok(false);
        }
        tables.students.insert(
            student_id.to_string(),
            StudentRecord {
                student_id: student_id.to_string(),
                status: status.as_str().to_string(),
                created_at: Some(at),
                updated_at: Some(at),
            },
        );
        Ok(true)
    }

    async fn update_status(
        &self,
        student_id: &StudentId,
        expected: UmbrellaStatus,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.enter("update_status")?;
        if self.write_lost() {
            return Ok(false);
        }

        let mut tables = self.tables();
        match tables.students.get_mut(student_id.as_str()) {
            Some(record) if record.status == expected.as_str() => {
                record.status = status.as_str().to_string();
                record.updated_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_history(
        &self,
        student_id: &StudentId,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<HistoryRecord> {
        self.enter("append_history")?;
        Ok(self.tables().push_history(student_id, action, at))
    }

    async fn record_transition(
        &self,
        student_id: &StudentId,
        prior: Option<UmbrellaStatus>,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<HistoryRecord>> {
        self.enter("record_transition")?;
        if self.write_lost() {
            return Ok(None);
        }

        let mut tables = self.tables();
        let current = tables.students.get(student_id.as_str());
        let unchanged = match (prior, current) {
            (None, None) => true,
            (Some(expected), Some(record)) => record.status == expected.as_str(),
            _ => false,
        };
        if !unchanged {
            return Ok(None);
        }

        let created_at = current.and_then(|r| r.created_at).or(Some(at));
        tables.students.insert(
            student_id.to_string(),
            StudentRecord {
                student_id: student_id.to_string(),
                status: action.resulting_status().as_str().to_string(),
                created_at,
                updated_at: Some(at),
            },
        );
        Ok(Some(tables.push_history(student_id, action, at)))
    }

    async fn history_for_student(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> StorageResult<Vec<HistoryRecord>> {
        self.enter("history_for_student")?;

        let mut records: Vec<_> = self
            .tables()
            .history
            .iter()
            .filter(|r| r.student_id == student_id.as_str())
            .cloned()
            .collect();
        newest_first(&mut records);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn recent_history(&self, limit: u32) -> StorageResult<Vec<HistoryRecord>> {
        self.enter("recent_history")?;

        let mut records = self.tables().history.clone();
        newest_first(&mut records);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.enter("health_check")
    }
}
