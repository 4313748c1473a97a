//! Row types shared by every store backend.
//!
//! Status and action columns are kept as their raw TEXT values, as they
//! appear in both the SQLite tables and the PostgREST JSON rows. Use the
//! typed accessors to convert them to domain enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use umbrella_core::{Action, UmbrellaStatus};

/// A student's current umbrella status (`students` table).
///
/// # Examples
///
/// ```
/// use umbrella_storage::models::StudentRecord;
/// use umbrella_core::UmbrellaStatus;
/// use chrono::Utc;
///
/// let record = StudentRecord {
///     student_id: "2112345678".to_string(),
///     status: "borrowed".to_string(),
///     created_at: Some(Utc::now()),
///     updated_at: Some(Utc::now()),
/// };
///
/// assert_eq!(record.umbrella_status().unwrap(), UmbrellaStatus::Borrowed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentRecord {
    /// Natural key: the student identifier read from the card.
    pub student_id: String,

    /// `borrowed` or `returned`.
    pub status: String,

    /// When the row was first written. Remote tables may omit it.
    #[serde(default, with = "lenient_timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the status last changed. Remote tables may omit it.
    #[serde(default, with = "lenient_timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StudentRecord {
    /// Parse the stored status column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column holds anything other than
    /// `borrowed` or `returned`.
    pub fn umbrella_status(&self) -> umbrella_core::Result<UmbrellaStatus> {
        self.status.parse()
    }
}

/// One successful borrow or return (`history` table). Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryRecord {
    pub id: i64,
    pub student_id: String,
    pub action: String,
    #[serde(with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Parse the stored action column.
    pub fn get_action(&self) -> umbrella_core::Result<Action> {
        self.action.parse()
    }
}

/// Timestamps written by other clients of the remote table store may lack
/// an offset (`2025-06-01T09:30:00.123456`). Those are read as UTC.
mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => super::serialize(ts, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
