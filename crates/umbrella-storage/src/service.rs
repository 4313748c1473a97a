//! Borrow/return business rules over a [`StatusStore`].
//!
//! Each student is in one of three states: no record, `returned`, or
//! `borrowed`. Borrowing is legal from no record or `returned`; returning
//! is legal only from `borrowed`. A legal transition writes the new status
//! and appends one history entry; a rejected one writes nothing.
//!
//! The status write and its history entry go to the store as one
//! transition, so a failed history write leaves the status untouched.
//! Status writes are conditional on the state the decision was based on.
//! When a concurrent writer gets there first the transition is re-evaluated
//! against the fresh state, up to [`MAX_WRITE_ATTEMPTS`] times.

use crate::error::{StorageError, StorageResult};
use crate::messages::DisplayMessages;
use crate::models::HistoryRecord;
use crate::store::{AnyStatusStore, StatusStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use umbrella_core::{Action, StudentId, UmbrellaStatus};

/// How many times a transition is evaluated before giving up on a
/// contended row.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Result of a status lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStatus {
    /// Whether the student has a row at all.
    pub exists: bool,

    /// Whether the student currently holds an umbrella.
    pub has_umbrella: bool,

    pub student_id: StudentId,

    /// Stored status; absent when `exists` is false.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<UmbrellaStatus>,
}

impl StudentStatus {
    fn unknown(student_id: StudentId) -> Self {
        Self {
            exists: false,
            has_umbrella: false,
            student_id,
            status: None,
        }
    }
}

/// Status code reported for a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Borrowed,
    Returned,
    AlreadyBorrowed,
    NotBorrowed,
}

impl TransitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::Returned => "returned",
            Self::AlreadyBorrowed => "already_borrowed",
            Self::NotBorrowed => "not_borrowed",
        }
    }
}

/// Outcome of a borrow or return request.
///
/// A rejection by the business rule is an `Ok` outcome with
/// `success == false`; store failures are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub success: bool,
    pub message: String,
    pub status: TransitionStatus,

    /// When the transition was recorded; absent for rejections.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TransitionOutcome {
    fn applied(action: Action, timestamp: DateTime<Utc>) -> Self {
        let (message, status) = match action {
            Action::Borrow => (DisplayMessages::BORROW_SUCCEEDED, TransitionStatus::Borrowed),
            Action::Return => (DisplayMessages::RETURN_SUCCEEDED, TransitionStatus::Returned),
        };
        Self {
            success: true,
            message: message.to_string(),
            status,
            timestamp: Some(timestamp),
        }
    }

    fn rejected(action: Action) -> Self {
        let (message, status) = match action {
            Action::Borrow => (
                DisplayMessages::ALREADY_BORROWED,
                TransitionStatus::AlreadyBorrowed,
            ),
            Action::Return => (
                DisplayMessages::NOTHING_BORROWED,
                TransitionStatus::NotBorrowed,
            ),
        };
        Self {
            success: false,
            message: message.to_string(),
            status,
            timestamp: None,
        }
    }
}

/// Lending service: the business rule plus history queries.
///
/// Cheap to clone; clones share the underlying store.
///
/// # Examples
///
/// ```
/// use umbrella_storage::service::UmbrellaService;
/// use umbrella_storage::store::MemoryStatusStore;
/// use umbrella_core::StudentId;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = UmbrellaService::new(MemoryStatusStore::new());
/// let student = StudentId::new("2112345678")?;
///
/// assert!(service.borrow(&student).await?.success);
/// assert!(!service.borrow(&student).await?.success);
/// assert!(service.return_umbrella(&student).await?.success);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UmbrellaService {
    store: AnyStatusStore,
}

impl UmbrellaService {
    /// Create a service over any store backend.
    pub fn new(store: impl Into<AnyStatusStore>) -> Self {
        Self {
            store: store.into(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &AnyStatusStore {
        &self.store
    }

    /// Look up a student's current status.
    pub async fn check_status(&self, student_id: &StudentId) -> StorageResult<StudentStatus> {
        let Some(record) = self.store.find_student(student_id).await? else {
            return Ok(StudentStatus::unknown(student_id.clone()));
        };

        let status = record.umbrella_status()?;
        Ok(StudentStatus {
            exists: true,
            has_umbrella: status.has_umbrella(),
            student_id: student_id.clone(),
            status: Some(status),
        })
    }

    /// Lend an umbrella to `student_id`.
    pub async fn borrow(&self, student_id: &StudentId) -> StorageResult<TransitionOutcome> {
        self.apply(student_id, Action::Borrow).await
    }

    /// Take an umbrella back from `student_id`.
    pub async fn return_umbrella(
        &self,
        student_id: &StudentId,
    ) -> StorageResult<TransitionOutcome> {
        self.apply(student_id, Action::Return).await
    }

    /// Run `action` for `student_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if every attempt lost its
    /// conditional write, or the store's error if a call fails.
    pub async fn apply(
        &self,
        student_id: &StudentId,
        action: Action,
    ) -> StorageResult<TransitionOutcome> {
        let target = action.resulting_status();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.check_status(student_id).await?;
            let now = Utc::now();

            let recorded = match (action, current.status) {
                (Action::Borrow, Some(UmbrellaStatus::Borrowed))
                | (Action::Return, None | Some(UmbrellaStatus::Returned)) => {
                    debug!(student_id = %student_id, %action, "transition rejected");
                    return Ok(TransitionOutcome::rejected(action));
                }
                (_, prior) => {
                    self.store
                        .record_transition(student_id, prior, action, now)
                        .await?
                }
            };

            if let Some(entry) = recorded {
                info!(
                    student_id = %student_id,
                    %action,
                    history_id = entry.id,
                    "umbrella {}",
                    target
                );
                return Ok(TransitionOutcome::applied(action, entry.timestamp));
            }

            warn!(
                student_id = %student_id,
                %action,
                attempt,
                "status changed concurrently, re-evaluating"
            );
        }

        Err(StorageError::Conflict {
            student_id: student_id.to_string(),
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// A student's history, newest first.
    pub async fn student_history(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> StorageResult<Vec<HistoryRecord>> {
        self.store.history_for_student(student_id, limit).await
    }

    /// Recent activity across all students, newest first.
    pub async fn recent_activity(&self, limit: u32) -> StorageResult<Vec<HistoryRecord>> {
        self.store.recent_history(limit).await
    }

    /// Verify the backing store is reachable.
    pub async fn health_check(&self) -> StorageResult<()> {
        self.store.health_check().await
    }
}
