use thiserror::Error;

/// Validation and configuration failures shared by every crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid action: {0} (expected 'borrow' or 'return')")]
    InvalidAction(String),

    #[error("Invalid umbrella status: {0}")]
    InvalidStatus(String),

    #[error("Invalid student ID: {0}")]
    InvalidStudentId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::InvalidAction("lend".into()).to_string(),
            "Invalid action: lend (expected 'borrow' or 'return')"
        );
        assert_eq!(
            Error::MissingConfig("SUPABASE_URL".into()).to_string(),
            "Missing configuration key: SUPABASE_URL"
        );
    }
}
