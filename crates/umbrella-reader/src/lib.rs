//! The card-to-action pipeline.
//!
//! A background reader loop waits for a student card, extracts the student
//! ID from the card's dump, and hands a [`TagReading`] to the
//! [`ReaderController`]. A single-flight worker then applies the pending
//! borrow or return action through the
//! [`UmbrellaService`](umbrella_storage::UmbrellaService), publishing
//! progress on the [`NotificationBus`] as it goes.
//!
//! ```text
//! reader loop ──TagReading──▶ controller queue ──▶ worker ──▶ store
//!      │                                            │
//!      └───────────── NotificationBus ◀─────────────┘
//! ```
//!
//! [`TagReading`]: umbrella_core::TagReading

pub mod config;
pub mod controller;
pub mod events;
pub mod extract;
pub mod state;

mod reader_loop;
mod worker;

pub use config::ReaderConfig;
pub use controller::{ReaderController, StartOutcome, StopOutcome};
pub use events::{
    NfcError, NotificationBus, ProcessResult, ProcessingPhase, ProcessingUpdate, ReaderStatusKind,
    ResultKind, ServerEvent, StatusUpdate,
};
pub use extract::extract_student_id;
pub use state::{ControllerStatus, ProcessingState, ReaderState};
