//! Retry with configurable backoff for calls to external services.

use std::future::Future;
use std::time::Duration;

use briefing_types::Result;

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let millis = base.as_millis() as u64 * 2u64.saturating_pow(attempt as u32);
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Call `f` up to `max_retries + 1` times.
///
/// Only errors for which [`briefing_types::BriefingError::is_retryable`]
/// holds are retried; anything else, and the last attempt's error, is
/// returned as is.
pub async fn execute_with_retry<F, Fut, T>(
    f: F,
    max_retries: usize,
    policy: &BackoffPolicy,
    label: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    call = %label,
                    attempt,
                    delay_ms = %delay.as_millis(),
                    error = %e,
                    "Retryable error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
