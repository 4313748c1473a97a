//! Table store backends.
//!
//! [`StatusStore`] is the narrow table-level contract the lending service
//! needs: read one student's row, write it conditionally, append history
//! and query history. Business rules live in
//! [`UmbrellaService`](crate::service::UmbrellaService), not here.
//!
//! Status writes are conditional so that two concurrent writers cannot
//! both apply a transition from the same observed state:
//!
//! - [`insert_student`](StatusStore::insert_student) only inserts when no
//!   row exists yet.
//! - [`update_status`](StatusStore::update_status) only updates when the
//!   stored status still equals the expected prior status.
//!
//! Both return `false` when the condition did not hold.
//!
//! [`record_transition`](StatusStore::record_transition) combines the
//! conditional write with the history append. SQLite runs both in one
//! transaction; the memory store holds its lock across both; PostgREST has
//! no multi-request transaction, so it undoes the status write when the
//! history insert fails.

#![allow(async_fn_in_trait)]

pub mod memory;
pub mod postgrest;
pub mod sqlite;

pub use memory::MemoryStatusStore;
pub use postgrest::{PostgrestStatusStore, SupabaseConfig};
pub use sqlite::SqliteStatusStore;

use crate::error::StorageResult;
use crate::models::{HistoryRecord, StudentRecord};
use chrono::{DateTime, Utc};
use umbrella_core::{Action, StudentId, UmbrellaStatus};

/// Table-level access to student status and lending history.
///
/// # Implementation Note
///
/// This trait uses native async trait methods (Edition 2024 feature).
/// Because such traits are not object-safe, callers that need a single
/// concrete type use [`AnyStatusStore`].
pub trait StatusStore: Send + Sync {
    /// Fetch a student's row, if any.
    async fn find_student(&self, student_id: &StudentId) -> StorageResult<Option<StudentRecord>>;

    /// Insert a row for a student that has none. Returns `false` if a row
    /// already exists.
    async fn insert_student(
        &self,
        student_id: &StudentId,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Move a student from `expected` to `status`. Returns `false` if the
    /// stored status is no longer `expected`.
    async fn update_status(
        &self,
        student_id: &StudentId,
        expected: UmbrellaStatus,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Append a history entry.
    async fn append_history(
        &self,
        student_id: &StudentId,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<HistoryRecord>;

    /// Apply `action` to a student whose stored status is `prior` (`None`
    /// for no row) and append its history entry, as one unit.
    ///
    /// Returns `None` without writing if the row no longer matches `prior`.
    /// When the history entry cannot be written the status change is not
    /// kept either.
    async fn record_transition(
        &self,
        student_id: &StudentId,
        prior: Option<UmbrellaStatus>,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<HistoryRecord>>;

    /// A student's history, newest first.
    async fn history_for_student(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> StorageResult<Vec<HistoryRecord>>;

    /// History across all students, newest first.
    async fn recent_history(&self, limit: u32) -> StorageResult<Vec<HistoryRecord>>;

    /// Verify the store is reachable.
    async fn health_check(&self) -> StorageResult<()>;
}

/// Enum wrapper for store backend dispatch.
#[derive(Debug, Clone)]
pub enum AnyStatusStore {
    /// Embedded SQLite database.
    Sqlite(SqliteStatusStore),

    /// Remote PostgREST endpoint (Supabase).
    Postgrest(PostgrestStatusStore),

    /// Process-local store for tests and demos.
    Memory(MemoryStatusStore),
}

impl AnyStatusStore {
    /// Short backend name for logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgrest(_) => "supabase",
            Self::Memory(_) => "memory",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStatusStore::Sqlite($store) => $call,
            AnyStatusStore::Postgrest($store) => $call,
            AnyStatusStore::Memory($store) => $call,
        }
    };
}

impl StatusStore for AnyStatusStore {
    async fn find_student(&self, student_id: &StudentId) -> StorageResult<Option<StudentRecord>> {
        dispatch!(self, store => store.find_student(student_id).await)
    }

    async fn insert_student(
        &self,
        student_id: &StudentId,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        dispatch!(self, store => store.insert_student(student_id, status, at).await)
    }

    async fn update_status(
        &self,
        student_id: &StudentId,
        expected: UmbrellaStatus,
        status: UmbrellaStatus,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        dispatch!(self, store => store.update_status(student_id, expected, status, at).await)
    }

    async fn append_history(
        &self,
        student_id: &StudentId,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<HistoryRecord> {
        dispatch!(self, store => store.append_history(student_id, action, at).await)
    }

    async fn record_transition(
        &self,
        student_id: &StudentId,
        prior: Option<UmbrellaStatus>,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<HistoryRecord>> {
        dispatch!(self, store => store.record_transition(student_id, prior, action, at).await)
    }

    async fn history_for_student(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> StorageResult<Vec<HistoryRecord>> {
        dispatch!(self, store => store.history_for_student(student_id, limit).await)
    }

    async fn recent_history(&self, limit: u32) -> StorageResult<Vec<HistoryRecord>> {
        dispatch!(self, store => store.recent_history(limit).await)
    }

    async fn health_check(&self) -> StorageResult<()> {
        dispatch!(self, store => store.health_check().await)
    }
}

impl From<SqliteStatusStore> for AnyStatusStore {
    fn from(store: SqliteStatusStore) -> Self {
        Self::Sqlite(store)
    }
}

impl From<PostgrestStatusStore> for AnyStatusStore {
    fn from(store: PostgrestStatusStore) -> Self {
        Self::Postgrest(store)
    }
}

impl From<MemoryStatusStore> for AnyStatusStore {
    fn from(store: MemoryStatusStore) -> Self {
        Self::Memory(store)
    }
}
