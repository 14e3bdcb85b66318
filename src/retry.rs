//! Bounded retry with exponential backoff.

use crate::config::RetrySettings;
use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(600);

/// Retry policy, fixed per process.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (>= 1).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor applied per failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with 0-based index `attempt`,
    /// capped at [`MAX_BACKOFF`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// The complete backoff schedule for a request that fails every attempt.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|i| self.delay_for(i))
            .collect()
    }
}

/// Outcome of a single attempt, kept for logging.
#[derive(Debug)]
pub struct FetchAttempt<'a> {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Name of the strategy invoked.
    pub source: &'a str,
    pub outcome: std::result::Result<(), &'a FetchError>,
}

/// Run `operation` under `policy`.
///
/// Only retryable errors are retried. The error of the last attempt is
/// returned once the budget is spent.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, source: &str, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let result = operation(attempt).await;

        let err = match result {
            Ok(value) => {
                debug!(
                    "{:?}",
                    FetchAttempt {
                        attempt: attempt + 1,
                        source,
                        outcome: Ok(()),
                    }
                );
                return Ok(value);
            }
            Err(e) => e,
        };

        debug!(
            "{:?}",
            FetchAttempt {
                attempt: attempt + 1,
                source,
                outcome: Err(&err),
            }
        );

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            warn!("Giving up after {} attempts: {}", max_attempts, err);
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "Attempt {}/{} via {} failed: {}, retrying in {:?}",
            attempt + 1,
            max_attempts,
            source,
            err,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
