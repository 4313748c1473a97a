use crate::{
    Result,
    constants::{MAX_STUDENT_ID_LENGTH, UNKNOWN_STUDENT_ID},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Student identifier (ASCII alphanumeric, 1-32 characters)
///
/// Identifiers read from cards are always 10 digits; identifiers typed in
/// through the manual API only need to be non-empty and ASCII alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    /// Create a new student ID with validation.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidStudentId` if the ID is empty, longer than
    /// 32 characters, or contains anything other than ASCII letters, digits
    /// and `-`.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(Error::InvalidStudentId("student ID is required".to_string()));
        }

        if id.len() > MAX_STUDENT_ID_LENGTH {
            return Err(Error::InvalidStudentId(format!(
                "must be at most {MAX_STUDENT_ID_LENGTH} chars, got {}",
                id.len()
            )));
        }

        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidStudentId(format!(
                "'{id}' contains unsupported characters"
            )));
        }

        if id == UNKNOWN_STUDENT_ID {
            return Err(Error::InvalidStudentId(format!(
                "'{UNKNOWN_STUDENT_ID}' is reserved"
            )));
        }

        Ok(StudentId(id.to_string()))
    }

    /// Get the student ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StudentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StudentId::new(s)
    }
}

impl TryFrom<String> for StudentId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        StudentId::new(&value)
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}

/// Borrow or return, as requested by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Borrow,
    Return,
}

impl Action {
    /// Wire and history-table name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Borrow => "borrow",
            Action::Return => "return",
        }
    }

    /// Status a student ends up in when this action succeeds.
    #[must_use]
    pub fn resulting_status(&self) -> UmbrellaStatus {
        match self {
            Action::Borrow => UmbrellaStatus::Borrowed,
            Action::Return => UmbrellaStatus::Returned,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "borrow" => Ok(Action::Borrow),
            "return" => Ok(Action::Return),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

/// Action applied to the next tag reading.
///
/// Starts out `Unset`; operators configure it before presenting a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAction {
    Borrow,
    Return,
    #[default]
    Unset,
}

impl PendingAction {
    /// The configured action, if any.
    #[must_use]
    pub fn action(&self) -> Option<Action> {
        match self {
            PendingAction::Borrow => Some(Action::Borrow),
            PendingAction::Return => Some(Action::Return),
            PendingAction::Unset => None,
        }
    }
}

impl From<Action> for PendingAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Borrow => PendingAction::Borrow,
            Action::Return => PendingAction::Return,
        }
    }
}

/// Persisted umbrella status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UmbrellaStatus {
    Borrowed,
    Returned,
}

impl UmbrellaStatus {
    /// Column value stored in the status table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UmbrellaStatus::Borrowed => "borrowed",
            UmbrellaStatus::Returned => "returned",
        }
    }

    /// Whether the student currently holds an umbrella.
    #[must_use]
    pub fn has_umbrella(&self) -> bool {
        matches!(self, UmbrellaStatus::Borrowed)
    }
}

impl fmt::Display for UmbrellaStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UmbrellaStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "borrowed" => Ok(UmbrellaStatus::Borrowed),
            "returned" => Ok(UmbrellaStatus::Returned),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// A card detected by the reader.
///
/// Created once per tag connect and consumed exactly once by the processing
/// worker. `student_id` is `None` when the card was detected but its dump
/// did not yield an identifier; on the wire that case is the string
/// `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReading {
    /// Hardware identifier of the tag, lowercase hex.
    #[serde(rename = "id")]
    pub identifier: String,

    /// When the tag was read.
    pub timestamp: DateTime<Utc>,

    /// Student ID extracted from the dump, if any.
    #[serde(with = "unknown_sentinel")]
    pub student_id: Option<StudentId>,
}

impl TagReading {
    /// Create a reading stamped with the current time.
    pub fn new(identifier: impl Into<String>, student_id: Option<StudentId>) -> Self {
        Self {
            identifier: identifier.into(),
            timestamp: Utc::now(),
            student_id,
        }
    }

    /// Whether a student ID was extracted from the card.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.student_id.is_some()
    }
}

/// Serializes `None` as the `"unknown"` sentinel and back.
mod unknown_sentinel {
    use super::StudentId;
    use crate::constants::UNKNOWN_STUDENT_ID;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &Option<StudentId>, s: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.serialize_str(id.as_str()),
            None => s.serialize_str(UNKNOWN_STUDENT_ID),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<StudentId>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref() {
            None | Some(UNKNOWN_STUDENT_ID) => Ok(None),
            Some(value) => StudentId::new(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
