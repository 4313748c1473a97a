//! Enum wrappers for reader dispatch.
//!
//! Native `async fn` in traits (RPITIT, Rust Edition 2024) is not
//! object-safe, so `Box<dyn NfcDriver>` is unavailable. These enums give
//! callers a single concrete driver and session type, which keeps the
//! reader loop's future `Send` when it is moved into a spawned task.
//!
//! # Examples
//!
//! ```
//! use umbrella_hardware::devices::AnyNfcDriver;
//! use umbrella_hardware::mock::MockNfcReader;
//! use umbrella_hardware::traits::NfcDriver;
//!
//! let (reader, _handle) = MockNfcReader::new();
//! let driver = AnyNfcDriver::Mock(reader);
//!
//! assert_eq!(driver.reader_info().name, "Mock NFC Reader");
//! ```

use crate::mock::{MockNfcReader, MockNfcSession};
use crate::traits::{DetectedTag, NfcDriver, NfcSession};
use crate::{ReaderInfo, Result};

/// Enum wrapper for reader driver dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyNfcDriver {
    /// Simulated reader for development and testing.
    Mock(MockNfcReader),
}

impl NfcDriver for AnyNfcDriver {
    type Session = AnyNfcSession;

    async fn open(&self) -> Result<AnyNfcSession> {
        match self {
            Self::Mock(driver) => driver.open().await.map(AnyNfcSession::Mock),
        }
    }

    fn reader_info(&self) -> ReaderInfo {
        match self {
            Self::Mock(driver) => driver.reader_info(),
        }
    }
}

impl From<MockNfcReader> for AnyNfcDriver {
    fn from(reader: MockNfcReader) -> Self {
        Self::Mock(reader)
    }
}

/// Enum wrapper for open sessions, mirroring [`AnyNfcDriver`].
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyNfcSession {
    /// Session on the simulated reader.
    Mock(MockNfcSession),
}

impl NfcSession for AnyNfcSession {
    async fn wait_for_tag(&mut self) -> Result<Option<DetectedTag>> {
        match self {
            Self::Mock(session) => session.wait_for_tag().await,
        }
    }

    async fn dump(&mut self, tag: &DetectedTag) -> Result<Vec<String>> {
        match self {
            Self::Mock(session) => session.dump(tag).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(session) => session.close().await,
        }
    }
}
