use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Bounded Retry
// ============================================================================
//
// Used for dependency connection at startup only. Per-message operations
// are never retried in-process; their failures go to the dead-letter topic.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl RetryConfig {
    /// Same delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Last error once the attempt budget is spent
    Failed(E),
}

/// Run `operation` until it succeeds or `max_attempts` is reached.
/// The closure receives the 1-based attempt number.
pub async fn retry_with_delay<F, Fut, T, E>(
    config: RetryConfig,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success(result);
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return RetryResult::Failed(error);
                }

                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %error,
                    delay_ms = config.delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );

                sleep(config.delay).await;
            }
        }
    }
}
