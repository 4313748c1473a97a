//! NFC reader trait definitions.
//!
//! A reader is modelled as two halves:
//!
//! - [`NfcDriver`] knows how to acquire the physical reader. Acquisition can
//!   fail (reader unplugged, claimed by another process) and callers are
//!   expected to retry.
//! - [`NfcSession`] is the acquired reader. It waits for tags and renders a
//!   detected tag's memory as dump text. Exactly one session is open at a
//!   time and its owner must close it on every exit path.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{ReaderInfo, TagType};

/// Minimum UID length in bytes (per ISO 14443 specification).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (per ISO 14443 specification).
pub const MAX_UID_LENGTH: usize = 10;

/// A tag that entered the reader's field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedTag {
    /// Tag identifier (UID for ISO 14443, IDm for FeliCa).
    pub identifier: Vec<u8>,

    /// Tag type reported by the reader.
    pub tag_type: TagType,

    /// Timestamp when the tag was detected.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DetectedTag {
    /// Create a detected tag stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier length is not within 4-10 bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use umbrella_hardware::traits::DetectedTag;
    /// use umbrella_hardware::types::TagType;
    ///
    /// let tag = DetectedTag::new(vec![0x01, 0x12, 0x03, 0x12, 0xd4, 0xa1, 0xb2, 0xc3], TagType::Type3).unwrap();
    /// assert_eq!(tag.identifier_hex(), "01120312d4a1b2c3");
    /// ```
    pub fn new(identifier: Vec<u8>, tag_type: TagType) -> Result<Self> {
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&identifier.len()) {
            return Err(crate::HardwareError::invalid_data(format!(
                "Tag identifier must be {}-{} bytes, got {}",
                MIN_UID_LENGTH,
                MAX_UID_LENGTH,
                identifier.len()
            )));
        }

        Ok(Self {
            identifier,
            tag_type,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Get the identifier as a lowercase hexadecimal string.
    pub fn identifier_hex(&self) -> String {
        self.identifier.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Acquires the physical reader.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic parameters, or the enum wrapper
/// [`AnyNfcDriver`](crate::devices::AnyNfcDriver) where a concrete type is
/// needed (for example when a session is moved into a spawned task).
pub trait NfcDriver: Send + Sync {
    /// Session type handed out by [`open`](NfcDriver::open).
    type Session: NfcSession;

    /// Open the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No reader is attached at the configured path
    /// - The reader is already claimed
    /// - The reader fails its initialization handshake
    async fn open(&self) -> Result<Self::Session>;

    /// Get reader information.
    fn reader_info(&self) -> ReaderInfo;
}

/// An acquired reader.
pub trait NfcSession: Send {
    /// Wait for a tag to enter the field.
    ///
    /// The wait policy (polling interval, number of iterations) belongs to
    /// the driver. Returns `Ok(None)` when the policy gives up without a tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader fails while polling. The session stays
    /// usable; callers may wait again.
    async fn wait_for_tag(&mut self) -> Result<Option<DetectedTag>>;

    /// Read the memory of a detected tag as dump text, one entry per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag leaves the field or rejects a read
    /// command part-way through.
    async fn dump(&mut self, tag: &DetectedTag) -> Result<Vec<String>>;

    /// Release the reader.
    ///
    /// Closing an already closed session is a no-op.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_tag_identifier_hex() {
        let tag = DetectedTag::new(vec![0x04, 0xAB, 0xCD, 0xEF], TagType::Type2).unwrap();
        assert_eq!(tag.identifier_hex(), "04abcdef");
    }

    #[test]
    fn test_detected_tag_invalid_length() {
        assert!(DetectedTag::new(vec![0x01, 0x02], TagType::Type3).is_err());
        assert!(DetectedTag::new(vec![0x01; 11], TagType::Type3).is_err());
        assert!(DetectedTag::new(vec![0x01; 4], TagType::Type3).is_ok());
        assert!(DetectedTag::new(vec![0x01; 10], TagType::Type3).is_ok());
    }
}
