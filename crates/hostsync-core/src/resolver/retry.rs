//! Retry with exponential backoff
//!
//! A bounded loop, not recursion: at most `max_attempts` calls, sleeping
//! `initial_delay * 2^n` before the n-th retry.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;

/// Retry policy for transient lookup failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Create a new policy
    pub fn new(max_attempts: usize, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// Attempt 1 waits `initial_delay`, attempt 2 waits twice that, and so on.
    pub fn backoff(&self, failed_attempt: usize) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16) as u32;
        self.initial_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    ///
    /// Returns the last error together with the number of attempts made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, (E, usize)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                        attempt, self.max_attempts, label, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.initial_delay())
    }
}
