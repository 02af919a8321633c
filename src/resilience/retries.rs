//! Retry decisions.
//!
//! Every failed attempt is retryable: transport failures and an empty
//! eligible set alike. The only limits are the attempt budget and whether
//! retries are enabled at all.

use std::time::Duration;

use axum::http::StatusCode;

use crate::config::RetryConfig;
use crate::resilience::backoff::linear_backoff;

/// Attempt budget and backoff for one request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            backoff_ms: config.backoff_ms,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` once `attempt` was the last.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(linear_backoff(self.backoff_ms, attempt))
        }
    }
}

/// Upstream statuses meaning the backend answered but is not serving.
///
/// 4xx are not failures (client error); other 5xx are application errors
/// passed through to the client.
pub fn is_failure_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::new(&RetryConfig::default());
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(3)));
        assert_eq!(policy.next_delay(4), None);
    }

    #[test]
    fn test_disabled_retries_allow_one_attempt() {
        let config = RetryConfig { enabled: false, ..Default::default() };
        let policy = RetryPolicy::new(&config);
        assert_eq!(policy.next_delay(1), None);
    }

    #[test]
    fn test_failure_statuses() {
        assert!(is_failure_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_failure_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_failure_status(StatusCode::NOT_FOUND));
    }
}
