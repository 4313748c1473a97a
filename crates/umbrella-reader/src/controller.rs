//! Reader controller: start/stop/restart, pending action, and the hand-off
//! between the reader loop and the processing worker.
//!
//! The controller owns all reader and processing state. It is shared with
//! request handlers as an `Arc<ReaderController>`; every method takes
//! `&self`.

use crate::config::ReaderConfig;
use crate::events::NotificationBus;
use crate::reader_loop;
use crate::state::{ControllerStatus, ProcessingState, ReaderState};
use crate::worker;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use umbrella_core::{Action, PendingAction, TagReading};
use umbrella_hardware::{AnyNfcDriver, NfcDriver, ReaderInfo};
use umbrella_storage::UmbrellaService;

/// Result of [`ReaderController::start`] and [`ReaderController::restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Refused: a processing run is still consuming the previous reading.
    Processing,
}

/// Result of [`ReaderController::stop`] and
/// [`ReaderController::stop_processing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Stopping,
    NotRunning,
}

/// A reading waiting for the worker, with the action captured when it was
/// queued.
#[derive(Debug, Clone)]
pub(crate) struct QueuedReading {
    pub(crate) reading: TagReading,
    pub(crate) action: PendingAction,
}

struct BackgroundTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

#[derive(Default)]
struct PipelineState {
    reader_state: ReaderState,
    processing_state: ProcessingState,
    pending_action: PendingAction,
    last_reading: Option<TagReading>,
    queue: VecDeque<QueuedReading>,
    worker: Option<BackgroundTask>,
}

impl PipelineState {
    /// A worker that ended without retiring (panic, abort) does not count.
    fn worker_live(&self) -> bool {
        self.worker.as_ref().is_some_and(BackgroundTask::is_live)
    }
}

/// State and collaborators shared by the controller, the reader loop and
/// the worker.
pub(crate) struct Pipeline {
    pub(crate) driver: AnyNfcDriver,
    pub(crate) service: UmbrellaService,
    pub(crate) bus: NotificationBus,
    pub(crate) config: ReaderConfig,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        // Every critical section leaves the state consistent before it can
        // panic, so a poisoned lock is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_reader_state(&self, state: ReaderState) {
        debug!(?state, "reader state");
        self.lock().reader_state = state;
    }

    pub(crate) fn set_processing_state(&self, state: ProcessingState) {
        self.lock().processing_state = state;
    }

    pub(crate) fn record_reading(&self, reading: TagReading) {
        self.lock().last_reading = Some(reading);
    }

    /// Queue a reading and make sure a worker will consume it.
    ///
    /// The push and the worker check happen under one lock, and the worker
    /// only retires under that same lock after seeing an empty queue.
    pub(crate) fn enqueue(self: &Arc<Self>, reading: TagReading) {
        let mut state = self.lock();
        let action = state.pending_action;
        state.queue.push_back(QueuedReading { reading, action });

        if !state.worker_live() {
            if state.worker.take().is_some() {
                warn!("processing worker ended abnormally, replacing it");
            }
            let token = CancellationToken::new();
            let handle = tokio::spawn(worker::run(Arc::clone(self), token.clone()));
            state.worker = Some(BackgroundTask { token, handle });
            info!(queued = state.queue.len(), "processing worker started");
        }
    }

    /// Take the next reading for the worker, or retire the worker.
    ///
    /// Returns `None` when the worker must exit: the queue is empty, or
    /// processing was stopped, in which case the remaining readings are
    /// abandoned.
    pub(crate) fn next_for_worker(&self, token: &CancellationToken) -> Option<QueuedReading> {
        let mut state = self.lock();

        if token.is_cancelled() {
            let abandoned = state.queue.len();
            state.queue.clear();
            if abandoned > 0 {
                warn!(abandoned, "processing stopped, queued readings abandoned");
            }
        } else if let Some(next) = state.queue.pop_front() {
            return Some(next);
        }

        state.worker = None;
        state.processing_state = ProcessingState::Idle;
        None
    }
}

/// Start/stop/restart state machine around one reader and one worker.
///
/// # Examples
///
/// ```
/// use umbrella_reader::{NotificationBus, ReaderConfig, ReaderController, StartOutcome};
/// use umbrella_hardware::mock::MockNfcReader;
/// use umbrella_storage::{MemoryStatusStore, UmbrellaService};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (reader, _handle) = MockNfcReader::new();
/// let controller = ReaderController::new(
///     reader,
///     UmbrellaService::new(MemoryStatusStore::new()),
///     NotificationBus::default(),
///     ReaderConfig::default(),
/// );
///
/// controller.set_action("borrow").unwrap();
/// assert_eq!(controller.start().await, StartOutcome::Started);
/// assert_eq!(controller.start().await, StartOutcome::AlreadyRunning);
/// controller.shutdown().await;
/// # }
/// ```
pub struct ReaderController {
    pipeline: Arc<Pipeline>,
    // Serializes start/stop/restart so two loops never overlap.
    reader: tokio::sync::Mutex<Option<BackgroundTask>>,
}

impl ReaderController {
    pub fn new(
        driver: impl Into<AnyNfcDriver>,
        service: UmbrellaService,
        bus: NotificationBus,
        config: ReaderConfig,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                driver: driver.into(),
                service,
                bus,
                config,
                state: Mutex::new(PipelineState::default()),
            }),
            reader: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the reader loop.
    ///
    /// Refused with [`StartOutcome::Processing`] while a processing run is
    /// active, so at most one reading is ever waiting to be consumed.
    pub async fn start(&self) -> StartOutcome {
        let mut reader = self.reader.lock().await;

        if let Some(task) = reader.as_ref()
            && task.is_live()
        {
            if !task.token.is_cancelled() {
                return StartOutcome::AlreadyRunning;
            }
            // A stop is in flight; let that loop finish releasing the reader.
            if let Some(task) = reader.take() {
                join(task).await;
            }
        }

        if self.is_processing() {
            info!("start refused, processing in progress");
            return StartOutcome::Processing;
        }

        self.spawn_loop(&mut reader);
        StartOutcome::Started
    }

    /// Ask the reader loop to stop at its next checkpoint.
    pub async fn stop(&self) -> StopOutcome {
        let reader = self.reader.lock().await;

        match reader.as_ref() {
            Some(task) if task.is_live() && !task.token.is_cancelled() => {
                info!("reader stop requested");
                task.token.cancel();
                StopOutcome::Stopping
            }
            _ => StopOutcome::NotRunning,
        }
    }

    /// Stop the reader loop, wait for it to release the reader, then start
    /// a new one regardless of any processing run.
    pub async fn restart(&self) -> StartOutcome {
        let mut reader = self.reader.lock().await;

        if let Some(task) = reader.take() {
            task.token.cancel();
            join(task).await;
        }

        info!("reader restarting");
        self.spawn_loop(&mut reader);
        StartOutcome::Started
    }

    /// Ask the worker to stop between readings. Readings still queued are
    /// abandoned.
    pub fn stop_processing(&self) -> StopOutcome {
        let state = self.pipeline.lock();

        match state.worker.as_ref() {
            Some(worker) if worker.is_live() && !worker.token.is_cancelled() => {
                info!("processing stop requested");
                worker.token.cancel();
                StopOutcome::Stopping
            }
            _ => StopOutcome::NotRunning,
        }
    }

    /// Stop both background tasks and wait for them.
    pub async fn shutdown(&self) {
        if let Some(task) = self.reader.lock().await.take() {
            task.token.cancel();
            join(task).await;
        }

        let worker = self.pipeline.lock().worker.take();
        if let Some(task) = worker {
            task.token.cancel();
            join(task).await;
        }
        info!("reader controller shut down");
    }

    /// Set the action applied to subsequent readings.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than `borrow` or `return`; the
    /// pending action is left unchanged.
    pub fn set_action(&self, action: &str) -> umbrella_core::Result<Action> {
        let action: Action = action.parse()?;
        self.pipeline.lock().pending_action = action.into();
        info!(%action, "pending action set");
        Ok(action)
    }

    pub fn pending_action(&self) -> PendingAction {
        self.pipeline.lock().pending_action
    }

    /// Whether a reader loop is acquiring or holding the reader.
    pub fn is_active(&self) -> bool {
        self.pipeline.lock().reader_state.is_active()
    }

    /// Whether a processing run is in flight.
    pub fn is_processing(&self) -> bool {
        self.pipeline.lock().worker_live()
    }

    pub fn last_reading(&self) -> Option<TagReading> {
        self.pipeline.lock().last_reading.clone()
    }

    pub fn reader_state(&self) -> ReaderState {
        self.pipeline.lock().reader_state
    }

    pub fn processing_state(&self) -> ProcessingState {
        self.pipeline.lock().processing_state.clone()
    }

    /// Number of readings waiting for the worker.
    pub fn queued_readings(&self) -> usize {
        self.pipeline.lock().queue.len()
    }

    /// Consistent snapshot of everything above.
    pub fn status(&self) -> ControllerStatus {
        let state = self.pipeline.lock();
        ControllerStatus {
            active: state.reader_state.is_active(),
            processing: state.worker_live(),
            last_tag_read: state.last_reading.clone(),
            action: state.pending_action,
            reader_state: state.reader_state,
            processing_state: state.processing_state.clone(),
        }
    }

    pub fn reader_info(&self) -> ReaderInfo {
        self.pipeline.driver.reader_info()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.pipeline.bus
    }

    pub fn service(&self) -> &UmbrellaService {
        &self.pipeline.service
    }

    fn spawn_loop(&self, slot: &mut Option<BackgroundTask>) {
        self.pipeline.set_reader_state(ReaderState::Starting);
        let token = CancellationToken::new();
        let handle = tokio::spawn(reader_loop::run(
            Arc::clone(&self.pipeline),
            token.clone(),
        ));
        *slot = Some(BackgroundTask { token, handle });
    }
}

async fn join(task: BackgroundTask) {
    if let Err(e) = task.handle.await {
        warn!(error = %e, "background task ended abnormally");
    }
}
