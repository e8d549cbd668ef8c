use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::RATE_LIMIT_MESSAGE;
use crate::{Error, Result};

const FALLBACK_MESSAGE: &str = "Failed to generate content from Gemini API";

/// Bounded retry on upstream throttling.
///
/// Only rate-limit failures are retried; anything else is returned at once. After the
/// k-th throttled attempt the policy sleeps `base_delay * (k + 1)` before trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the attempt following failed attempt number `failed` (1-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        self.base_delay.saturating_mul(failed.saturating_add(1))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<Error> = None;
        for attempt in 1..=self.max_attempts {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() => {
                    if attempt == self.max_attempts {
                        warn!(attempt, error = %e, "rate limit retries exhausted");
                        return Err(Error::rate_limited(RATE_LIMIT_MESSAGE));
                    }
                    let delay = self.delay_after(attempt);
                    info!(
                        attempt,
                        retries_left = self.max_attempts - attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limit hit, retrying"
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::runtime(FALLBACK_MESSAGE)))
    }
}
