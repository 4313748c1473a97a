//! Notification events and the fan-out bus.
//!
//! Events are serialized as `{"event": <name>, "data": {...}}` frames,
//! the shape the kiosk front end listens for. The bus is a
//! [`tokio::sync::broadcast`] channel: publishing never waits for
//! observers, and an observer that falls behind skips the events it missed.

use crate::state::ControllerStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use umbrella_core::{Action, StudentId, TagReading};
use umbrella_storage::TransitionStatus;

/// Default number of events buffered per observer.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Everything the pipeline tells its observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Controller snapshot, sent to an observer when it connects.
    NfcStatus(ControllerStatus),

    /// Reader lifecycle change.
    NfcStatusUpdate(StatusUpdate),

    /// Reader failure.
    NfcError(NfcError),

    /// A tag was read.
    NfcTagRead(TagReading),

    /// Processing progress for the current reading.
    ProcessingUpdate(ProcessingUpdate),
}

impl ServerEvent {
    /// Event name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NfcStatus(_) => "nfc_status",
            Self::NfcStatusUpdate(_) => "nfc_status_update",
            Self::NfcError(_) => "nfc_error",
            Self::NfcTagRead(_) => "nfc_tag_read",
            Self::ProcessingUpdate(_) => "processing_update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderStatusKind {
    ReaderStarted,
    ReaderRetrying,
    ReaderStopped,
    TagDetected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ReaderStatusKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcError {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    Started,
    InProgress,
    Completed,
    Error,
}

/// Whether a completed run changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// The transition was applied.
    Success,
    /// The business rule rejected the transition.
    Warning,
}

/// Result attached to a `completed` processing update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub student_id: StudentId,
    pub action: Action,
    pub status: TransitionStatus,
    pub processed_at: DateTime<Utc>,
    pub result: ResultKind,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingUpdate {
    pub status: ProcessingPhase,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<ProcessResult>,
}

impl ProcessingUpdate {
    pub fn started(message: impl Into<String>) -> Self {
        Self::new(ProcessingPhase::Started, 0, message)
    }

    pub fn in_progress(progress: u8, message: impl Into<String>) -> Self {
        Self::new(ProcessingPhase::InProgress, progress, message)
    }

    pub fn completed(message: impl Into<String>, result: ProcessResult) -> Self {
        Self {
            result: Some(result),
            ..Self::new(ProcessingPhase::Completed, 100, message)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ProcessingPhase::Error, 0, message)
    }

    fn new(status: ProcessingPhase, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            progress,
            message: message.into(),
            result: None,
        }
    }
}

/// Fire-and-forget fan-out of [`ServerEvent`]s.
///
/// Cloning the bus shares the same channel.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl NotificationBus {
    /// Create a bus buffering up to `capacity` events per observer.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event to every current observer.
    pub fn publish(&self, event: ServerEvent) {
        trace!(event = event.name(), "publishing");
        if self.tx.send(event).is_err() {
            debug!("no observers connected, event dropped");
        }
    }

    pub fn status_update(&self, status: ReaderStatusKind, message: impl Into<String>) {
        self.publish(ServerEvent::NfcStatusUpdate(StatusUpdate {
            status,
            message: message.into(),
        }));
    }

    pub fn error(&self, error: impl Into<String>) {
        self.publish(ServerEvent::NfcError(NfcError {
            error: error.into(),
        }));
    }

    pub fn tag_read(&self, reading: TagReading) {
        self.publish(ServerEvent::NfcTagRead(reading));
    }

    pub fn processing(&self, update: ProcessingUpdate) {
        self.publish(ServerEvent::ProcessingUpdate(update));
    }
}
