//! Bounded retry with exponential backoff.

use std::time::Duration;

use reqwest::StatusCode;

use rag_core::ServiceConfig;

/// How often and how patiently a failed service call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Total attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the given failed attempt (1-based): backoff × 2^(attempt−1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// Throttling and server-side failures are worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Transport failures that may clear up on their own.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_default_follows_service_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }
}
