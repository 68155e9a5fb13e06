//! Retry with exponential backoff for CMS requests

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::CmsError;
use crate::config::RetryConfig;

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut f: F) -> Result<T, CmsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CmsError>>,
{
    let mut attempt = 0;
    let mut backoff = Duration::from_millis(config.initial_backoff_ms);

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    if config.max_retries > 0 {
                        warn!("Max retries ({}) reached: {}", config.max_retries, e);
                    }
                    return Err(e);
                }

                warn!(
                    "Retry attempt {}/{} after {}, waiting {:?}",
                    attempt, config.max_retries, e, backoff
                );

                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff, config);
            }
        }
    }
}

fn next_backoff(current: Duration, config: &RetryConfig) -> Duration {
    let next = current.as_millis() as f64 * config.backoff_multiplier;
    Duration::from_millis(next.min(config.max_backoff_ms as f64) as u64)
}
