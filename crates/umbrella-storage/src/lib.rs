//! Storage layer for the umbrella lending desk.
//!
//! This crate persists each student's umbrella status and an append-only
//! lending history, and implements the borrow/return business rule on top.
//!
//! # Architecture
//!
//! - [`StatusStore`] - table-level contract with conditional writes
//! - [`SqliteStatusStore`] - embedded SQLite backend ([`Database`] pool with
//!   embedded migrations)
//! - [`PostgrestStatusStore`] - remote Supabase/PostgREST backend
//! - [`MemoryStatusStore`] - process-local backend with call accounting and
//!   failure injection, for tests and demos
//! - [`UmbrellaService`] - business rule, lost-update handling and history
//!   queries over any backend
//!
//! # Examples
//!
//! ```no_run
//! use umbrella_storage::{Database, DatabaseConfig, SqliteStatusStore, UmbrellaService};
//! use umbrella_core::StudentId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("umbrella.db")).await?;
//! let service = UmbrellaService::new(SqliteStatusStore::from_database(&db));
//!
//! let student = StudentId::new("2112345678")?;
//! let outcome = service.borrow(&student).await?;
//! println!("{}: {}", outcome.status.as_str(), outcome.message);
//!
//! for entry in service.student_history(&student, 10).await? {
//!     println!("{} {} {}", entry.timestamp, entry.student_id, entry.action);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # SQL Injection Prevention
//!
//! All SQLite queries use parameterized statements via SQLx. PostgREST
//! filters are sent as encoded query parameters, and student IDs are
//! restricted to ASCII alphanumerics and `-` before they reach a store.

pub mod connection;
pub mod error;
pub mod messages;
pub mod models;
pub mod service;
pub mod store;
pub mod transaction;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use messages::DisplayMessages;
pub use models::{HistoryRecord, StudentRecord};
pub use service::{StudentStatus, TransitionOutcome, TransitionStatus, UmbrellaService};
pub use store::{
    AnyStatusStore, MemoryStatusStore, PostgrestStatusStore, SqliteStatusStore, StatusStore,
    SupabaseConfig,
};
