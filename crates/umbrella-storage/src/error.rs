use thiserror::Error;

/// Storage-specific error types for the umbrella lending desk.
///
/// Covers both backends: SQL failures from the embedded SQLite store and
/// transport or API failures from the PostgREST store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// HTTP transport to the remote table store failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote table store answered with a non-success status
    #[error("Table store returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A conditional write kept losing to concurrent writers
    #[error("Conflicting update for student {student_id} after {attempts} attempts")]
    Conflict { student_id: String, attempts: u32 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored row could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid domain value (student id, action, status)
    #[error(transparent)]
    Domain(#[from] umbrella_core::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Whether the error is a lost-update conflict rather than a store outage.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
