use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};

/// Exponential backoff for the managed backend.
///
/// Attempt `n` (1-based) that fails waits `base_delay_ms * multiplier^(n-1)`
/// before attempt `n + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.base_delay_ms as f64 * multiplier) as u64)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts (then [`PersistError::Unavailable`]).
    pub async fn run<T, F, Fut>(
        &self,
        backend: &'static str,
        operation: &str,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= attempts => {
                    tracing::error!(backend, operation, attempts, error = %e, "giving up");
                    return Err(PersistError::Unavailable {
                        backend,
                        attempts,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        backend,
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after backend failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
