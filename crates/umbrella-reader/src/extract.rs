//! Student ID extraction from tag dump text.
//!
//! The dump is scanned line by line for the FE00 section. Inside it, the
//! first data line (`0000:`) whose printable column holds a 12-digit run
//! yields the student ID: the run without its two-digit prefix. The next
//! section header ends the search.

use regex::Regex;
use std::sync::LazyLock;
use umbrella_core::constants::{
    DATA_LINE_MARKER, FE00_SECTION_MARKER, ID_PREFIX_DIGITS, PRINTABLE_COLUMN_SEPARATOR,
    SECTION_HEADER_PREFIX,
};

// ASCII digits only: the prefix is dropped by byte offset.
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{12}").expect("digit-run pattern is valid"));

/// Extract the student ID from dump lines.
///
/// Returns `None` when the FE00 section is absent, when no data line in it
/// carries a 12-digit run, or when another section starts first. Never
/// fails.
///
/// # Examples
///
/// ```
/// use umbrella_reader::extract::extract_student_id;
///
/// let dump = [
///     "System 0000",
///     "System FE00",
///     "0000: 00 |123456789012345678 text",
/// ];
/// assert_eq!(extract_student_id(&dump), Some("3456789012".to_string()));
/// ```
pub fn extract_student_id<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    let mut in_section = false;

    for line in lines.iter().map(AsRef::as_ref) {
        if line.contains(FE00_SECTION_MARKER) {
            in_section = true;
        } else if in_section && line.contains(DATA_LINE_MARKER) {
            if let Some(id) = student_id_from_data_line(line) {
                return Some(id);
            }
        } else if in_section && line.starts_with(SECTION_HEADER_PREFIX) {
            return None;
        }
    }

    None
}

/// The printable column is the text between the first and second `|`.
fn printable_text(line: &str) -> &str {
    line.split(PRINTABLE_COLUMN_SEPARATOR)
        .nth(1)
        .map(str::trim)
        .unwrap_or(line)
}

fn student_id_from_data_line(line: &str) -> Option<String> {
    DIGIT_RUN
        .find(printable_text(line))
        .map(|run| run.as_str()[ID_PREFIX_DIGITS..].to_string())
}
