//! Programmable stand-in for the card reader.
//!
//! Used by the server when no physical reader is attached, and by tests that
//! need to present cards on cue.

pub mod nfc;

pub use nfc::{DEFAULT_MOCK_POLL_TIMEOUT, MockNfcHandle, MockNfcReader, MockNfcSession};
