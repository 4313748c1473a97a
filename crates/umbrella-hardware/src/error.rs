//! Error types for NFC reader operations.
//!
//! Failures fall into three groups that callers treat differently: the
//! reader could not be acquired (retry acquisition), the wait for a tag
//! failed (report and keep polling), or a detected tag could not be read
//! (treat the reading as unknown).

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No usable reader at the configured path.
    #[error("Initialization failed: {message}")]
    OpenFailed { message: String },

    /// Another session or process holds the reader.
    #[error("Reader busy: {message}")]
    Busy { message: String },

    /// The reader went away mid-session.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Transport-level failure while talking to the reader.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// The tag left the field or rejected a read command.
    #[error("Tag command error: {message}")]
    TagCommand { message: String },

    /// The reader reported something that is not a valid tag.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl HardwareError {
    pub fn open_failed(message: impl Into<String>) -> Self {
        Self::OpenFailed {
            message: message.into(),
        }
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    pub fn tag_command(message: impl Into<String>) -> Self {
        Self::TagCommand {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Whether the error came from the tag rather than the reader.
    ///
    /// Tag-level errors only affect the card currently in the field.
    pub fn is_tag_error(&self) -> bool {
        matches!(self, Self::TagCommand { .. } | Self::InvalidData { .. })
    }

    /// Whether acquiring the reader again may succeed.
    pub fn is_acquisition_error(&self) -> bool {
        matches!(self, Self::OpenFailed { .. } | Self::Busy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HardwareError::open_failed("no such device: 'usb'"), "Initialization failed: no such device: 'usb'")]
    #[case(HardwareError::busy("claimed by pid 4242"), "Reader busy: claimed by pid 4242")]
    #[case(HardwareError::disconnected("RC-S380"), "Device disconnected: RC-S380")]
    #[case(HardwareError::communication("usb stall"), "Communication error: usb stall")]
    #[case(HardwareError::tag_command("tag left the field"), "Tag command error: tag left the field")]
    fn test_display(#[case] error: HardwareError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_error_groups() {
        assert!(HardwareError::tag_command("gone").is_tag_error());
        assert!(HardwareError::invalid_data("bad block").is_tag_error());
        assert!(!HardwareError::communication("usb stall").is_tag_error());

        assert!(HardwareError::open_failed("absent").is_acquisition_error());
        assert!(HardwareError::busy("claimed").is_acquisition_error());
        assert!(!HardwareError::disconnected("usb").is_acquisition_error());
        assert!(!HardwareError::tag_command("gone").is_acquisition_error());
    }
}
