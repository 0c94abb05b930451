use std::future::Future;

use rand::Rng;
use tokio::time::Duration;

use crate::cancel::BatchCancellation;
use crate::config::RetryConfig;
use crate::error::{classify, ErrorCategory, HarvestError, Result};

/// Computes `min(max_delay, base * 2^(attempt-1)) * uniform(0,1)`, the
/// standard full-jitter backoff formula.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config
        .base_delay_ms
        .saturating_mul(1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX));
    let capped = exp.min(config.max_delay_ms);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_millis((capped as f64 * jitter) as u64)
}

/// Runs `op` according to `config` and the category-specific
/// `max_attempts` override, racing each backoff sleep against
/// cancellation. Gives up immediately on a terminal category.
pub async fn run<T, F, Fut>(
    mut op: F,
    config: &RetryConfig,
    cancel: &BatchCancellation,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let category = classify(&err);
                let recovery = category.recovery();
                let attempt_cap = max_attempts_for(category, config);
                if !recovery.retryable || attempt >= attempt_cap {
                    return Err(err);
                }
                log::debug!(
                    "attempt {attempt} failed with category {category:?}, backing off"
                );
                let delay = backoff_delay(config, attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                }
            }
        }
    }
}

/// Per-category attempt cap, letting quota/permission failures fail fast
/// while network hiccups get a bounded retry budget, never exceeding the
/// caller-configured ceiling.
pub fn max_attempts_for(category: ErrorCategory, default_config: &RetryConfig) -> u32 {
    use ErrorCategory::*;
    if !category.recovery().retryable {
        return 1;
    }
    let category_cap = match category {
        Network | Timeout | Unknown => 3,
        RateLimited => 5,
        _ => default_config.max_attempts,
    };
    category_cap.min(default_config.max_attempts).max(1)
}
