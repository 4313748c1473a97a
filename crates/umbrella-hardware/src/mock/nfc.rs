//! Mock NFC reader implementation for testing and development.
//!
//! This module provides a simulated reader that can be controlled
//! programmatically: tags are presented through a [`MockNfcHandle`], and
//! acquisition or polling failures can be injected to exercise retry paths.

use crate::{
    HardwareError, Result,
    traits::{DetectedTag, NfcDriver, NfcSession},
    types::{ReaderInfo, TagType},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// How long a mock session waits for a tag before reporting none.
pub const DEFAULT_MOCK_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Mock NFC reader for testing and development.
///
/// Cloning the reader shares the same simulated device.
///
/// # Examples
///
/// ```
/// use umbrella_hardware::mock::MockNfcReader;
/// use umbrella_hardware::traits::{NfcDriver, NfcSession};
///
/// #[tokio::main]
/// async fn main() -> umbrella_hardware::Result<()> {
///     let (reader, handle) = MockNfcReader::new();
///
///     handle
///         .present_tag(vec![0x01, 0x02, 0x03, 0x04], vec!["System FE00".to_string()])
///         .await?;
///
///     let mut session = reader.open().await?;
///     let tag = session.wait_for_tag().await?.expect("tag presented");
///     assert_eq!(session.dump(&tag).await?, vec!["System FE00".to_string()]);
///     session.close().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockNfcReader {
    shared: Arc<Shared>,
}

impl MockNfcReader {
    /// Create a new mock reader with the default name and poll timeout.
    ///
    /// Returns a tuple of (MockNfcReader, MockNfcHandle) where the handle
    /// can be used to simulate tag presentations.
    pub fn new() -> (Self, MockNfcHandle) {
        Self::with_poll_timeout(DEFAULT_MOCK_POLL_TIMEOUT)
    }

    /// Create a new mock reader whose sessions give up waiting after
    /// `poll_timeout`.
    pub fn with_poll_timeout(poll_timeout: Duration) -> (Self, MockNfcHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);

        let shared = Arc::new(Shared {
            name: "Mock NFC Reader".to_string(),
            poll_timeout,
            event_rx: Mutex::new(event_rx),
            failing_opens: AtomicU32::new(0),
            open_attempts: AtomicU32::new(0),
            session_open: AtomicBool::new(false),
            sessions_closed: AtomicU32::new(0),
        });

        let reader = Self {
            shared: Arc::clone(&shared),
        };
        let handle = MockNfcHandle { event_tx, shared };

        (reader, handle)
    }
}

impl NfcDriver for MockNfcReader {
    type Session = MockNfcSession;

    async fn open(&self) -> Result<MockNfcSession> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .shared
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(HardwareError::open_failed(
                "no reader found on path 'usb'",
            ));
        }

        if self.shared.session_open.swap(true, Ordering::SeqCst) {
            return Err(HardwareError::busy("reader is already claimed"));
        }

        Ok(MockNfcSession {
            shared: Arc::clone(&self.shared),
            pending_dump: None,
            open: true,
        })
    }

    fn reader_info(&self) -> ReaderInfo {
        ReaderInfo::new(self.shared.name.clone(), "usb")
    }
}

/// Session handed out by [`MockNfcReader::open`].
#[derive(Debug)]
pub struct MockNfcSession {
    shared: Arc<Shared>,
    pending_dump: Option<DumpContent>,
    open: bool,
}

impl NfcSession for MockNfcSession {
    async fn wait_for_tag(&mut self) -> Result<Option<DetectedTag>> {
        if !self.open {
            return Err(HardwareError::disconnected("session closed"));
        }

        let mut event_rx = self.shared.event_rx.lock().await;
        let event = match tokio::time::timeout(self.shared.poll_timeout, event_rx.recv()).await {
            Err(_) => return Ok(None),
            Ok(None) => return Err(HardwareError::disconnected("NFC event channel closed")),
            Ok(Some(event)) => event,
        };

        match event {
            MockEvent::Tag { tag, dump } => {
                self.pending_dump = Some(dump);
                Ok(Some(tag))
            }
            MockEvent::WaitError(message) => Err(HardwareError::communication(message)),
        }
    }

    async fn dump(&mut self, _tag: &DetectedTag) -> Result<Vec<String>> {
        match self.pending_dump.take() {
            Some(DumpContent::Lines(lines)) => Ok(lines),
            Some(DumpContent::Fail(message)) => Err(HardwareError::tag_command(message)),
            None => Err(HardwareError::tag_command("no tag in field")),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.shared.session_open.store(false, Ordering::SeqCst);
            self.shared.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockNfcSession {
    fn drop(&mut self) {
        // Release the device without counting a close, so tests can tell a
        // leaked session from a properly closed one.
        if self.open {
            self.shared.session_open.store(false, Ordering::SeqCst);
        }
    }
}

/// Handle for controlling a mock NFC reader.
///
/// Cloning the handle shares the same simulated device.
#[derive(Debug, Clone)]
pub struct MockNfcHandle {
    event_tx: mpsc::Sender<MockEvent>,
    shared: Arc<Shared>,
}

impl MockNfcHandle {
    /// Present a FeliCa tag whose dump renders as `dump`.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier length is invalid or the reader
    /// has been dropped.
    pub async fn present_tag(&self, identifier: Vec<u8>, dump: Vec<String>) -> Result<()> {
        let tag = DetectedTag::new(identifier, TagType::Type3)?;
        self.send(MockEvent::Tag {
            tag,
            dump: DumpContent::Lines(dump),
        })
        .await
    }

    /// Present a tag that is detected but fails while being dumped.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier length is invalid or the reader
    /// has been dropped.
    pub async fn present_unreadable_tag(
        &self,
        identifier: Vec<u8>,
        message: impl Into<String>,
    ) -> Result<()> {
        let tag = DetectedTag::new(identifier, TagType::Type3)?;
        self.send(MockEvent::Tag {
            tag,
            dump: DumpContent::Fail(message.into()),
        })
        .await
    }

    /// Make the next wait-for-tag call fail with a communication error.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn inject_wait_error(&self, message: impl Into<String>) -> Result<()> {
        self.send(MockEvent::WaitError(message.into())).await
    }

    /// Make the next `count` open attempts fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.shared.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Number of open attempts made so far.
    pub fn open_attempts(&self) -> u32 {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }

    /// Whether a session currently holds the reader.
    pub fn is_session_open(&self) -> bool {
        self.shared.session_open.load(Ordering::SeqCst)
    }

    /// Number of sessions closed through [`NfcSession::close`].
    pub fn sessions_closed(&self) -> u32 {
        self.shared.sessions_closed.load(Ordering::SeqCst)
    }

    async fn send(&self, event: MockEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("NFC event channel closed"))
    }
}

#[derive(Debug)]
struct Shared {
    name: String,
    poll_timeout: Duration,
    event_rx: Mutex<mpsc::Receiver<MockEvent>>,
    failing_opens: AtomicU32,
    open_attempts: AtomicU32,
    session_open: AtomicBool,
    sessions_closed: AtomicU32,
}

/// Internal event type for the mock reader.
#[derive(Debug)]
enum MockEvent {
    Tag { tag: DetectedTag, dump: DumpContent },
    WaitError(String),
}

#[derive(Debug)]
enum DumpContent {
    Lines(Vec<String>),
    Fail(String),
}
