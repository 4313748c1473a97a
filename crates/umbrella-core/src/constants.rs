//! Shared constants for dump parsing and pipeline pacing.
//!
//! Student ID cards are FeliCa tags. Their dump text contains one block per
//! system code; the block introduced by [`FE00_SECTION_MARKER`] carries the
//! record holding the student number, rendered as hex bytes followed by a
//! printable-text column between `|` characters:
//!
//! ```text
//! System FE00 (Common Area)
//!   0000: 30 31 32 32 30 31 32 33 34 35 36 37 20 20 20 20 |012201234567    |
//! System 8000
//! ```
//!
//! The printable column holds a 12-digit run; the first two digits are a
//! campus prefix and the remaining [`STUDENT_ID_DIGITS`] form the student ID.

use std::time::Duration;

// ============================================================================
// Dump Parsing
// ============================================================================

/// Marker that opens the dump section holding the student record.
pub const FE00_SECTION_MARKER: &str = "System FE00";

/// Substring identifying the first data line of a section.
pub const DATA_LINE_MARKER: &str = "0000:";

/// Prefix of any section header line. Seeing one inside the FE00 section
/// means the section has ended.
pub const SECTION_HEADER_PREFIX: &str = "System";

/// Separator around the printable-text column of a dump line.
pub const PRINTABLE_COLUMN_SEPARATOR: char = '|';

/// Length of the digit run encoded on the card.
pub const RAW_ID_DIGITS: usize = 12;

/// Leading digits of the raw run that are not part of the student ID.
pub const ID_PREFIX_DIGITS: usize = 2;

/// Length of the logical student ID.
pub const STUDENT_ID_DIGITS: usize = RAW_ID_DIGITS - ID_PREFIX_DIGITS;

/// Wire sentinel for a reading whose student ID could not be extracted.
pub const UNKNOWN_STUDENT_ID: &str = "unknown";

/// Longest student ID accepted from API callers.
pub const MAX_STUDENT_ID_LENGTH: usize = 32;

// ============================================================================
// Reader Acquisition and Polling
// ============================================================================

/// Attempts to open the reader before a run gives up.
pub const DEFAULT_ACQUIRE_ATTEMPTS: u32 = 5;

/// Delay between reader open attempts.
pub const DEFAULT_ACQUIRE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Delay before polling again after a failed wait-for-tag call.
pub const DEFAULT_POLL_ERROR_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// Processing Pacing
// ============================================================================

/// Pause between processing steps so observers can follow progress.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(500);

/// Pause before reporting an unreadable card, giving the user time to lift
/// the card before being asked to tap again.
pub const DEFAULT_RETAP_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Queries
// ============================================================================

/// Default number of rows returned by a per-student history query.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Default number of rows returned by the recent activity feed.
pub const DEFAULT_RECENT_LIMIT: u32 = 20;

/// Upper bound on any history query.
pub const MAX_QUERY_LIMIT: u32 = 200;
