//! Reader and processing state machines, and the status snapshot.

use crate::events::ResultKind;
use serde::{Deserialize, Serialize};
use umbrella_core::{PendingAction, TagReading};

/// Lifecycle of the reader loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReaderState {
    /// No loop running.
    #[default]
    Stopped,

    /// Loop spawned, first acquisition attempt pending.
    Starting,

    /// Acquisition failed; retry number `attempt` is next.
    Retrying { attempt: u32 },

    /// Reader acquired and polling for tags.
    Running,

    /// Every acquisition attempt failed. Inactive until started again.
    ErrorHalted,
}

impl ReaderState {
    /// Whether a loop is acquiring or holding the reader.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Retrying { .. } | Self::Running
        )
    }
}

/// Progress of the current processing run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessingState {
    /// No run in flight.
    #[default]
    Idle,
    Started,
    InProgress { percent: u8 },
    Completed { outcome: ResultKind },
    Error { reason: String },
}

/// Point-in-time view of the controller, as served by the status endpoint
/// and sent to new event subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub active: bool,
    pub processing: bool,
    pub last_tag_read: Option<TagReading>,
    pub action: PendingAction,
    pub reader_state: ReaderState,
    pub processing_state: ProcessingState,
}
