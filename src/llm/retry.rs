use crate::error::LlmError;
use std::time::Duration;
use tokio::time::sleep;

/// Caller-side retry policy. The adapter itself never retries; callers that
/// want backoff wrap their calls in [`with_retry`].
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32, error: &LlmError) -> u64 {
        error.retry_after_ms().unwrap_or_else(|| {
            let exponential = self
                .base_delay_ms
                .saturating_mul(1u64 << (attempt - 1).min(16));
            exponential.min(self.max_delay_ms)
        })
    }
}

/// Retries `operation` on transient failures with exponential backoff.
/// Fatal errors (bad requests, unusable output) are returned immediately.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay_ms = config.delay_for_attempt(attempt, &e);

                tracing::warn!(
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms,
                    error = %e,
                    "request failed, retrying"
                );

                sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
