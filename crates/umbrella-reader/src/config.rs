//! Pipeline timing and retry configuration.

use std::time::Duration;
use umbrella_core::constants::{
    DEFAULT_ACQUIRE_ATTEMPTS, DEFAULT_ACQUIRE_RETRY_DELAY, DEFAULT_POLL_ERROR_DELAY,
    DEFAULT_RETAP_DELAY, DEFAULT_STEP_DELAY,
};

/// Settings for the reader loop and processing worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Reader acquisition attempts before halting. At least one attempt is
    /// always made.
    pub acquire_attempts: u32,

    /// Delay between acquisition attempts.
    pub acquire_retry_delay: Duration,

    /// Delay after a failed wait-for-tag before polling again.
    pub poll_error_delay: Duration,

    /// Pacing delay between processing steps.
    pub step_delay: Duration,

    /// Delay before telling the student to tap again.
    pub retap_delay: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            acquire_attempts: DEFAULT_ACQUIRE_ATTEMPTS,
            acquire_retry_delay: DEFAULT_ACQUIRE_RETRY_DELAY,
            poll_error_delay: DEFAULT_POLL_ERROR_DELAY,
            step_delay: DEFAULT_STEP_DELAY,
            retap_delay: DEFAULT_RETAP_DELAY,
        }
    }
}

impl ReaderConfig {
    pub fn acquire_attempts(mut self, attempts: u32) -> Self {
        self.acquire_attempts = attempts.max(1);
        self
    }

    pub fn acquire_retry_delay(mut self, delay: Duration) -> Self {
        self.acquire_retry_delay = delay;
        self
    }

    pub fn poll_error_delay(mut self, delay: Duration) -> Self {
        self.poll_error_delay = delay;
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn retap_delay(mut self, delay: Duration) -> Self {
        self.retap_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.acquire_attempts, 5);
        assert_eq!(config.acquire_retry_delay, Duration::from_secs(1));
        assert_eq!(config.poll_error_delay, Duration::from_secs(2));
        assert_eq!(config.step_delay, Duration::from_millis(500));
        assert_eq!(config.retap_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let config = ReaderConfig::default().acquire_attempts(0);
        assert_eq!(config.acquire_attempts, 1);
    }
}
