//! The card reader loop: acquire the reader, poll for one tag, hand the
//! reading to the controller, release the reader.

use crate::controller::Pipeline;
use crate::events::ReaderStatusKind;
use crate::extract::extract_student_id;
use crate::state::ReaderState;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use umbrella_core::{StudentId, TagReading};
use umbrella_hardware::{AnyNfcSession, DetectedTag, NfcDriver, NfcSession};
use umbrella_storage::DisplayMessages;

pub(crate) async fn run(pipeline: Arc<Pipeline>, token: CancellationToken) {
    let Some(mut session) = acquire(&pipeline, &token).await else {
        return;
    };

    pipeline.set_reader_state(ReaderState::Running);
    pipeline
        .bus
        .status_update(ReaderStatusKind::ReaderStarted, DisplayMessages::READER_STARTED);
    info!(reader = %pipeline.driver.reader_info().name, "reader started");

    poll(&pipeline, &mut session, &token).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close reader session");
    }
    stopped(&pipeline);
}

fn stopped(pipeline: &Pipeline) {
    pipeline.set_reader_state(ReaderState::Stopped);
    pipeline
        .bus
        .status_update(ReaderStatusKind::ReaderStopped, DisplayMessages::READER_STOPPED);
    info!("reader stopped");
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn pause(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn acquire(pipeline: &Pipeline, token: &CancellationToken) -> Option<AnyNfcSession> {
    let max_attempts = pipeline.config.acquire_attempts.max(1);

    for attempt in 1..=max_attempts {
        if token.is_cancelled() {
            stopped(pipeline);
            return None;
        }

        let retry = attempt - 1;
        if retry > 0 {
            pipeline.set_reader_state(ReaderState::Retrying { attempt: retry });
            pipeline.bus.status_update(
                ReaderStatusKind::ReaderRetrying,
                DisplayMessages::retrying(retry, max_attempts),
            );
        }

        match pipeline.driver.open().await {
            Ok(session) => return Some(session),
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "reader acquisition failed");

                if attempt == max_attempts {
                    error!(attempts = max_attempts, "giving up on reader acquisition");
                    pipeline.set_reader_state(ReaderState::ErrorHalted);
                    pipeline
                        .bus
                        .error(DisplayMessages::acquisition_failed(&e.to_string()));
                    return None;
                }

                if !pause(token, pipeline.config.acquire_retry_delay).await {
                    stopped(pipeline);
                    return None;
                }
            }
        }
    }

    None
}

async fn poll(pipeline: &Arc<Pipeline>, session: &mut AnyNfcSession, token: &CancellationToken) {
    while !token.is_cancelled() {
        match session.wait_for_tag().await {
            Ok(None) => continue,
            Ok(Some(tag)) => {
                on_tag(pipeline, session, tag).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "waiting for tag failed");
                pipeline.bus.error(e.to_string());
                if !pause(token, pipeline.config.poll_error_delay).await {
                    return;
                }
            }
        }
    }
}

async fn on_tag(pipeline: &Arc<Pipeline>, session: &mut AnyNfcSession, tag: DetectedTag) {
    let student_id = read_student_id(session, &tag).await;
    let reading = TagReading::new(tag.identifier_hex(), student_id);
    info!(
        tag = %reading.identifier,
        student_id = reading.student_id.as_ref().map(StudentId::as_str),
        "tag read"
    );

    pipeline.record_reading(reading.clone());
    pipeline.bus.tag_read(reading.clone());

    let message = match &reading.student_id {
        Some(id) => DisplayMessages::tag_detected(id.as_str()),
        None => DisplayMessages::TAG_UNREADABLE.to_string(),
    };
    pipeline
        .bus
        .status_update(ReaderStatusKind::TagDetected, message);

    pipeline.enqueue(reading);
}

/// Dump the tag and extract the student ID. Any failure yields `None`.
async fn read_student_id(session: &mut AnyNfcSession, tag: &DetectedTag) -> Option<StudentId> {
    let lines = match session.dump(tag).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!(tag = %tag.identifier_hex(), error = %e, "tag dump failed");
            return None;
        }
    };

    let raw = extract_student_id(&lines)?;
    match StudentId::new(&raw) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(raw = %raw, error = %e, "extracted value is not a student ID");
            None
        }
    }
}
