//! Single-flight processing worker.
//!
//! Drains the controller's queue one reading at a time, driving each
//! through status check, borrow or return, and confirmation, with a
//! pacing delay between steps so the kiosk can show progress.

use crate::controller::{Pipeline, QueuedReading};
use crate::events::{ProcessResult, ProcessingPhase, ProcessingUpdate, ResultKind};
use crate::state::ProcessingState;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use umbrella_core::Action;
use umbrella_storage::{DisplayMessages, StorageError};

pub(crate) async fn run(pipeline: Arc<Pipeline>, token: CancellationToken) {
    while let Some(queued) = pipeline.next_for_worker(&token) {
        if let Err(e) = process(&pipeline, queued).await {
            error!(error = %e, "processing failed, reading dropped");
            emit(
                &pipeline,
                ProcessingUpdate::error(DisplayMessages::processing_failed(&e.to_string())),
            );
        }
    }
    info!("processing worker finished");
}

fn emit(pipeline: &Pipeline, update: ProcessingUpdate) {
    let state = match update.status {
        ProcessingPhase::Started => ProcessingState::Started,
        ProcessingPhase::InProgress => ProcessingState::InProgress {
            percent: update.progress,
        },
        ProcessingPhase::Completed => ProcessingState::Completed {
            outcome: update
                .result
                .as_ref()
                .map_or(ResultKind::Success, |r| r.result),
        },
        ProcessingPhase::Error => ProcessingState::Error {
            reason: update.message.clone(),
        },
    };
    pipeline.set_processing_state(state);
    pipeline.bus.processing(update);
}

async fn process(pipeline: &Pipeline, queued: QueuedReading) -> Result<(), StorageError> {
    let step = pipeline.config.step_delay;
    let service = &pipeline.service;

    emit(pipeline, ProcessingUpdate::started(DisplayMessages::PROCESSING_STARTED));

    let Some(student_id) = queued.reading.student_id else {
        sleep(pipeline.config.retap_delay).await;
        warn!(tag = %queued.reading.identifier, "reading has no student ID");
        emit(pipeline, ProcessingUpdate::error(DisplayMessages::RETRY_TAP));
        return Ok(());
    };

    sleep(step).await;
    emit(
        pipeline,
        ProcessingUpdate::in_progress(25, DisplayMessages::checking_status(student_id.as_str())),
    );
    service.check_status(&student_id).await?;

    sleep(step).await;
    let Some(action) = queued.action.action() else {
        warn!(student_id = %student_id, "no action configured");
        emit(pipeline, ProcessingUpdate::error(DisplayMessages::ACTION_NOT_SET));
        return Ok(());
    };

    let message = match action {
        Action::Borrow => DisplayMessages::BORROW_IN_PROGRESS,
        Action::Return => DisplayMessages::RETURN_IN_PROGRESS,
    };
    emit(pipeline, ProcessingUpdate::in_progress(50, message));
    let outcome = service.apply(&student_id, action).await?;

    sleep(step).await;
    emit(
        pipeline,
        ProcessingUpdate::in_progress(75, DisplayMessages::CONFIRMING_RESULT),
    );

    sleep(step).await;
    let result = if outcome.success {
        ResultKind::Success
    } else {
        ResultKind::Warning
    };
    info!(student_id = %student_id, %action, status = outcome.status.as_str(), "reading processed");

    let message = outcome.message.clone();
    emit(
        pipeline,
        ProcessingUpdate::completed(
            message,
            ProcessResult {
                student_id,
                action,
                status: outcome.status,
                processed_at: Utc::now(),
                result,
                details: outcome.message,
            },
        ),
    );
    Ok(())
}
