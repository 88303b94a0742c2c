//! Bounded retries with linear backoff around a single [`WeatherSource`] call

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::{FetchError, WeatherSource};
use crate::models::{DateRange, Observation, Region};

/// How often to retry and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: NonZeroU32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }

    /// Wait after failed attempt `attempt` (1-based): `base_delay * attempt`
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Suspends the caller between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Every attempt failed transiently
    #[error("failed after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: FetchError },

    /// The upstream contract was violated; not retried
    #[error("non-retryable failure: {0}")]
    NonTransient(FetchError),
}

/// Call `source` until it succeeds, fails non-transiently, or the policy's
/// attempts are used up. Sleeps `policy.delay_after(n)` after each failed
/// attempt `n` except the last.
pub async fn fetch_with_retry(
    source: &dyn WeatherSource,
    sleeper: &dyn Sleeper,
    region: &Region,
    range: DateRange,
    policy: &RetryPolicy,
) -> Result<Vec<Observation>, RetryError> {
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        let error = match source.fetch(region, range).await {
            Ok(observations) => return Ok(observations),
            Err(error) if !error.is_transient() => return Err(RetryError::NonTransient(error)),
            Err(error) => error,
        };

        warn!(
            "{} {}: {} (retry {}/{})",
            region.id, range, error, attempt, max_attempts
        );

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.delay_after(attempt);
        debug!("Backing off {:.1}s before attempt {}", delay.as_secs_f64(), attempt + 1);
        sleeper.sleep(delay).await;
        attempt += 1;
    }
}
