//! Caller-side retry policy
//!
//! The upstream client never retries on its own; handlers that want retries
//! wrap their call in a `RetryPolicy`. Only transport errors and 5xx replies
//! are retried, with exponential backoff capped at `max_delay`.

use std::future::Future;
use std::time::Duration;
use studyhub_common::config::RetryConfig;
use tracing::warn;

use super::UpstreamError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::from(&RetryConfig::default())
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Run `operation` until it succeeds, fails with a final error, or the
    /// retry budget is spent
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries && e.is_retryable() => {
                    let delay = self.delay_for(retry);
                    warn!(
                        attempt = retry + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamBody;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn status_error(status: u16) -> UpstreamError {
        UpstreamError::Status {
            status,
            body: UpstreamBody::Opaque(String::new()),
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        });
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }

    #[test]
    fn test_default_policy_never_retries() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = fast_policy(2)
            .run(move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status_error(503))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), _> = fast_policy(3)
            .run(move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(status_error(400))
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::Status { status: 400, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), _> = fast_policy(2)
            .run(move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::Transport("connection refused".to_string()))
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::Transport(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
