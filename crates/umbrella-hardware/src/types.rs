//! Common types shared across reader implementations.

use serde::{Deserialize, Serialize};

/// NFC reader information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "Sony RC-S380").
    pub name: String,

    /// Device path the reader was opened on (e.g., "usb").
    pub path: String,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// NFC Forum tag type of a detected tag.
///
/// Student ID cards are FeliCa, which is [`TagType::Type3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TagType {
    /// Type 1 (Topaz).
    Type1,

    /// Type 2 (Mifare Ultralight, NTAG).
    Type2,

    /// Type 3 (FeliCa).
    Type3,

    /// Type 4 (ISO-DEP, DESFire).
    Type4,

    /// Anything the reader could not classify.
    Unknown,
}

impl TagType {
    /// Get a human-readable name for the tag type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Type1 => "Type1Tag",
            Self::Type2 => "Type2Tag",
            Self::Type3 => "Type3Tag",
            Self::Type4 => "Type4Tag",
            Self::Unknown => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_info() {
        let info = ReaderInfo::new("Mock NFC Reader", "usb");
        assert_eq!(info.name, "Mock NFC Reader");
        assert_eq!(info.path, "usb");
    }

    #[test]
    fn test_tag_type_name() {
        assert_eq!(TagType::Type3.name(), "Type3Tag");
        assert_eq!(TagType::Unknown.name(), "Unknown");
    }

    #[test]
    fn test_tag_type_serialization() {
        let json = serde_json::to_string(&TagType::Type3).unwrap();
        let back: TagType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TagType::Type3);
    }
}
