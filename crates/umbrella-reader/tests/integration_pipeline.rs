//! End-to-end tests for the reader loop and processing worker.
//!
//! Every test runs on a paused clock: sleeps, poll timeouts and retry
//! delays resolve instantly once all tasks are idle.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use umbrella_core::{Action, PendingAction, StudentId, UmbrellaStatus};
use umbrella_hardware::mock::{MockNfcHandle, MockNfcReader};
use umbrella_reader::{
    NotificationBus, ProcessingPhase, ProcessingState, ProcessingUpdate, ReaderConfig,
    ReaderController, ReaderState, ReaderStatusKind, ResultKind, ServerEvent, StartOutcome,
    StopOutcome,
};
use umbrella_storage::{DisplayMessages, MemoryStatusStore, TransitionStatus, UmbrellaService};

const STUDENT: &str = "2112345678";

struct Harness {
    controller: ReaderController,
    handle: MockNfcHandle,
    store: MemoryStatusStore,
    events: broadcast::Receiver<ServerEvent>,
}

fn harness() -> Harness {
    let (reader, handle) = MockNfcReader::new();
    let store = MemoryStatusStore::new();
    let bus = NotificationBus::new(256);
    let events = bus.subscribe();
    let controller = ReaderController::new(
        reader,
        UmbrellaService::new(store.clone()),
        bus,
        ReaderConfig::default(),
    );

    Harness {
        controller,
        handle,
        store,
        events,
    }
}

fn felica_id(last: u8) -> Vec<u8> {
    vec![0x01, 0x12, 0x03, 0x12, 0xd4, 0xa1, 0xb2, last]
}

/// Dump of a student card whose FE00 data line carries `01` + `student_id`.
fn student_card(student_id: &str) -> Vec<String> {
    vec![
        "Type3Tag 'FeliCa Standard (RC-S962)' ID=01120312D4A1B2C3 SYS=FE00".to_string(),
        "System 8FC1 (Suica)".to_string(),
        "  0000: 30 31 32 33 34 35 36 37 38 39 30 31 32 33 34 35 |0123456789012345|".to_string(),
        "System FE00 (Common Area)".to_string(),
        format!("  0000: 30 31 32 31 31 32 33 34 35 36 37 38 20 20 20 20 |01{}    |", student_id),
    ]
}

fn sid(id: &str) -> StudentId {
    StudentId::new(id).unwrap()
}

async fn next_event(events: &mut broadcast::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event bus closed")
}

/// Collect events until a processing run finishes (completed or error).
async fn until_processed(events: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(
            &event,
            ServerEvent::ProcessingUpdate(ProcessingUpdate {
                status: ProcessingPhase::Completed | ProcessingPhase::Error,
                ..
            })
        );
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Collect events until the given reader status update is seen.
async fn until_status(
    events: &mut broadcast::Receiver<ServerEvent>,
    kind: ReaderStatusKind,
) -> Vec<ServerEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(&event, ServerEvent::NfcStatusUpdate(update) if update.status == kind);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn processing_updates(events: &[ServerEvent]) -> Vec<ProcessingUpdate> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::ProcessingUpdate(update) => Some(update.clone()),
            _ => None,
        })
        .collect()
}

fn phases(updates: &[ProcessingUpdate]) -> Vec<(ProcessingPhase, u8)> {
    updates.iter().map(|u| (u.status, u.progress)).collect()
}

fn reader_statuses(events: &[ServerEvent]) -> Vec<ReaderStatusKind> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::NfcStatusUpdate(update) => Some(update.status),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_borrow_runs_every_step() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    assert_eq!(h.controller.start().await, StartOutcome::Started);

    let mut events = until_processed(&mut h.events).await;
    if !reader_statuses(&events).contains(&ReaderStatusKind::ReaderStopped) {
        events.extend(until_status(&mut h.events, ReaderStatusKind::ReaderStopped).await);
    }

    assert_eq!(
        reader_statuses(&events),
        vec![
            ReaderStatusKind::ReaderStarted,
            ReaderStatusKind::TagDetected,
            ReaderStatusKind::ReaderStopped,
        ]
    );

    let tag_read = events
        .iter()
        .position(|e| matches!(e, ServerEvent::NfcTagRead(_)))
        .unwrap();
    let detected = events
        .iter()
        .position(|e| {
            matches!(e, ServerEvent::NfcStatusUpdate(u) if u.status == ReaderStatusKind::TagDetected)
        })
        .unwrap();
    assert!(tag_read < detected);

    let ServerEvent::NfcTagRead(reading) = &events[tag_read] else {
        unreachable!();
    };
    assert_eq!(reading.identifier, "01120312d4a1b2c3");
    assert_eq!(reading.student_id, Some(sid(STUDENT)));

    let updates = processing_updates(&events);
    assert_eq!(
        phases(&updates),
        vec![
            (ProcessingPhase::Started, 0),
            (ProcessingPhase::InProgress, 25),
            (ProcessingPhase::InProgress, 50),
            (ProcessingPhase::InProgress, 75),
            (ProcessingPhase::Completed, 100),
        ]
    );
    assert_eq!(updates[1].message, DisplayMessages::checking_status(STUDENT));
    assert_eq!(updates[2].message, DisplayMessages::BORROW_IN_PROGRESS);

    let result = updates[4].result.as_ref().unwrap();
    assert_eq!(result.result, ResultKind::Success);
    assert_eq!(result.status, TransitionStatus::Borrowed);
    assert_eq!(result.action, Action::Borrow);
    assert_eq!(result.student_id, sid(STUDENT));

    let status = h.controller.service().check_status(&sid(STUDENT)).await.unwrap();
    assert_eq!(status.status, Some(UmbrellaStatus::Borrowed));
    assert_eq!(h.store.history_len(), 1);

    // The loop handled one tag, released the reader, and the worker retired.
    assert!(!h.controller.is_active());
    assert!(!h.controller.is_processing());
    assert_eq!(h.controller.processing_state(), ProcessingState::Idle);
    assert_eq!(h.handle.sessions_closed(), 1);
    assert!(!h.handle.is_session_open());
    assert_eq!(h.controller.last_reading().unwrap().student_id, Some(sid(STUDENT)));
}

#[tokio::test(start_paused = true)]
async fn test_return_after_borrow() {
    let mut h = harness();
    h.store.seed_student(&sid(STUDENT), UmbrellaStatus::Borrowed);
    h.controller.set_action("return").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    let updates = processing_updates(&until_processed(&mut h.events).await);

    assert_eq!(updates[2].message, DisplayMessages::RETURN_IN_PROGRESS);
    let result = updates.last().unwrap().result.as_ref().unwrap();
    assert_eq!(result.result, ResultKind::Success);
    assert_eq!(result.status, TransitionStatus::Returned);
    assert_eq!(h.store.history_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_gives_up_after_every_attempt_fails() {
    let mut h = harness();
    h.handle.fail_next_opens(5);

    assert_eq!(h.controller.start().await, StartOutcome::Started);

    let mut retrying = Vec::new();
    let error = loop {
        match next_event(&mut h.events).await {
            ServerEvent::NfcStatusUpdate(update) => {
                assert_eq!(update.status, ReaderStatusKind::ReaderRetrying);
                retrying.push(update.message);
            }
            ServerEvent::NfcError(error) => break error,
            other => panic!("unexpected event {:?}", other),
        }
    };

    assert_eq!(
        retrying,
        (1..=4)
            .map(|n| DisplayMessages::retrying(n, 5))
            .collect::<Vec<_>>()
    );
    assert!(error.error.contains("no reader found"));
    assert_eq!(h.handle.open_attempts(), 5);
    assert!(!h.controller.is_active());
    assert_eq!(h.controller.reader_state(), ReaderState::ErrorHalted);

    // Nothing else is published after the halt.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.events.try_recv().is_err());

    // A halted reader can be started again.
    assert_eq!(h.controller.start().await, StartOutcome::Started);
    let events = until_status(&mut h.events, ReaderStatusKind::ReaderStarted).await;
    assert_eq!(events.len(), 1);
    h.controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_recovers_after_a_failure() {
    let mut h = harness();
    h.handle.fail_next_opens(2);

    h.controller.start().await;
    let events = until_status(&mut h.events, ReaderStatusKind::ReaderStarted).await;

    assert_eq!(
        reader_statuses(&events),
        vec![
            ReaderStatusKind::ReaderRetrying,
            ReaderStatusKind::ReaderRetrying,
            ReaderStatusKind::ReaderStarted,
        ]
    );
    assert_eq!(h.controller.reader_state(), ReaderState::Running);
    h.controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_card_without_student_id_asks_for_retap() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0x01), vec!["System 8FC1 (Suica)".to_string()])
        .await
        .unwrap();

    h.controller.start().await;
    let events = until_processed(&mut h.events).await;

    let detected = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::NfcStatusUpdate(u) if u.status == ReaderStatusKind::TagDetected => {
                Some(u.message.clone())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(detected, DisplayMessages::TAG_UNREADABLE);

    let updates = processing_updates(&events);
    assert_eq!(
        phases(&updates),
        vec![(ProcessingPhase::Started, 0), (ProcessingPhase::Error, 0)]
    );
    assert_eq!(updates[1].message, DisplayMessages::RETRY_TAP);
    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.controller.last_reading().unwrap().student_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_dump_is_an_unknown_reading() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_unreadable_tag(felica_id(0x02), "tag left the field")
        .await
        .unwrap();

    h.controller.start().await;
    let events = until_processed(&mut h.events).await;

    let reading = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::NfcTagRead(reading) => Some(reading.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(reading.student_id, None);
    assert!(!reading.is_readable());

    let updates = processing_updates(&events);
    assert_eq!(updates.last().unwrap().message, DisplayMessages::RETRY_TAP);
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unset_action_stops_after_status_check() {
    let mut h = harness();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    let updates = processing_updates(&until_processed(&mut h.events).await);

    assert_eq!(
        phases(&updates),
        vec![
            (ProcessingPhase::Started, 0),
            (ProcessingPhase::InProgress, 25),
            (ProcessingPhase::Error, 0),
        ]
    );
    assert_eq!(updates[2].message, DisplayMessages::ACTION_NOT_SET);
    assert_eq!(h.store.calls(), 1);
    assert_eq!(h.store.history_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_borrow_completes_with_warning() {
    let mut h = harness();
    h.store.seed_student(&sid(STUDENT), UmbrellaStatus::Borrowed);
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    let updates = processing_updates(&until_processed(&mut h.events).await);

    let last = updates.last().unwrap();
    assert_eq!(last.status, ProcessingPhase::Completed);
    assert_eq!(last.progress, 100);
    let result = last.result.as_ref().unwrap();
    assert_eq!(result.result, ResultKind::Warning);
    assert_eq!(result.status, TransitionStatus::AlreadyBorrowed);
    assert_eq!(result.details, DisplayMessages::ALREADY_BORROWED);
    assert_eq!(h.store.history_len(), 0);
    assert_eq!(
        h.controller.processing_state(),
        ProcessingState::Idle,
        "worker retires after the run"
    );
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_reports_processing_error() {
    let mut h = harness();
    h.store.fail_next_calls(1);
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    let updates = processing_updates(&until_processed(&mut h.events).await);

    assert_eq!(
        phases(&updates),
        vec![
            (ProcessingPhase::Started, 0),
            (ProcessingPhase::InProgress, 25),
            (ProcessingPhase::Error, 0),
        ]
    );
    assert!(
        updates[2]
            .message
            .starts_with(&DisplayMessages::processing_failed(""))
    );
    assert_eq!(h.store.history_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeatedly_lost_writes_report_processing_error() {
    let mut h = harness();
    h.store.lose_next_writes(3);
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    let updates = processing_updates(&until_processed(&mut h.events).await);

    let last = updates.last().unwrap();
    assert_eq!(last.status, ProcessingPhase::Error);
    assert!(last.message.contains(STUDENT));
    assert_eq!(h.store.history_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_action_is_captured_when_the_reading_is_queued() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    until_status(&mut h.events, ReaderStatusKind::TagDetected).await;
    h.controller.set_action("return").unwrap();

    let updates = processing_updates(&until_processed(&mut h.events).await);
    let result = updates.last().unwrap().result.as_ref().unwrap();
    assert_eq!(result.action, Action::Borrow);
    assert_eq!(result.status, TransitionStatus::Borrowed);
    assert_eq!(h.controller.pending_action(), PendingAction::Return);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_refused_while_processing() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    until_status(&mut h.events, ReaderStatusKind::TagDetected).await;

    assert!(h.controller.is_processing());
    assert!(h.controller.queued_readings() <= 1);
    assert_eq!(h.controller.start().await, StartOutcome::Processing);
    assert!(h.controller.status().processing);

    until_processed(&mut h.events).await;
    assert!(!h.controller.is_processing());
    assert_eq!(h.controller.start().await, StartOutcome::Started);
    h.controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_error_is_reported_and_polling_continues() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle.inject_wait_error("usb stall").await.unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    let events = until_processed(&mut h.events).await;

    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::NfcError(error) => Some(error.error.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["Communication error: usb stall".to_string()]);

    let updates = processing_updates(&events);
    assert_eq!(updates.last().unwrap().status, ProcessingPhase::Completed);
    assert_eq!(h.handle.open_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_the_reader() {
    let mut h = harness();

    h.controller.start().await;
    until_status(&mut h.events, ReaderStatusKind::ReaderStarted).await;
    assert!(h.handle.is_session_open());

    assert_eq!(h.controller.stop().await, StopOutcome::Stopping);
    until_status(&mut h.events, ReaderStatusKind::ReaderStopped).await;

    assert!(!h.controller.is_active());
    assert!(!h.handle.is_session_open());
    assert_eq!(h.handle.sessions_closed(), 1);
    assert_eq!(h.controller.reader_state(), ReaderState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_restart_never_overlaps_loops() {
    let mut h = harness();

    h.controller.start().await;
    assert_eq!(h.controller.restart().await, StartOutcome::Started);
    assert_eq!(h.controller.restart().await, StartOutcome::Started);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.handle.is_session_open());
    assert_eq!(h.controller.restart().await, StartOutcome::Started);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.handle.is_session_open());

    h.controller.shutdown().await;

    // Every session that was opened was also closed, and none was refused
    // because another loop still held the reader.
    assert!(!h.handle.is_session_open());
    assert_eq!(h.handle.sessions_closed(), h.handle.open_attempts());
    while let Ok(event) = h.events.try_recv() {
        assert!(
            !matches!(event, ServerEvent::NfcError(_)),
            "unexpected error event {:?}",
            event
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_processing_abandons_queued_readings() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();
    h.handle
        .present_tag(felica_id(0xc3), student_card(STUDENT))
        .await
        .unwrap();

    h.controller.start().await;
    loop {
        if let ServerEvent::ProcessingUpdate(update) = next_event(&mut h.events).await
            && update.status == ProcessingPhase::Started
        {
            break;
        }
    }

    // Restart ignores the processing guard, so a second reading can queue
    // behind the one in flight.
    h.handle
        .present_tag(felica_id(0xc4), student_card("2198765432"))
        .await
        .unwrap();
    assert_eq!(h.controller.restart().await, StartOutcome::Started);
    until_status(&mut h.events, ReaderStatusKind::TagDetected).await;
    assert_eq!(h.controller.queued_readings(), 1);

    assert_eq!(h.controller.stop_processing(), StopOutcome::Stopping);
    assert_eq!(h.controller.stop_processing(), StopOutcome::NotRunning);

    let updates = processing_updates(&until_processed(&mut h.events).await);
    assert_eq!(updates.last().unwrap().status, ProcessingPhase::Completed);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!h.controller.is_processing());
    assert_eq!(h.controller.queued_readings(), 0);
    assert_eq!(h.store.history_len(), 1);
    assert!(
        !h.controller
            .service()
            .check_status(&sid("2198765432"))
            .await
            .unwrap()
            .exists
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let mut h = harness();
    h.controller.set_action("borrow").unwrap();

    h.controller.start().await;
    until_status(&mut h.events, ReaderStatusKind::ReaderStarted).await;

    h.controller.shutdown().await;

    assert!(!h.controller.is_active());
    assert!(!h.controller.is_processing());
    assert!(!h.handle.is_session_open());
    assert_eq!(h.controller.stop().await, StopOutcome::NotRunning);
}
