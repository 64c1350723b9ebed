//! Bounded exponential backoff for fallible async operations.
//!
//! Provider calls are wrapped in [`backoff`] so that a transient network
//! failure is retried before it counts as that provider's outcome. The delay
//! after the n-th failure (counting from zero) is `base_ms * factor^n`. There
//! is no jitter and no delay cap: large `tries`/`factor` values mean
//! unbounded worst-case latency.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry schedule for [`backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffOptions {
    /// Total number of attempts (0 is treated as 1).
    pub tries: u32,
    /// Delay after the first failure, in milliseconds.
    pub base_ms: u64,
    /// Multiplier applied to the delay after each further failure.
    pub factor: f64,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            tries: 3,
            base_ms: 250,
            factor: 2.0,
        }
    }
}

impl BackoffOptions {
    /// Delay to wait after the failure of attempt `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let millis = self.base_ms as f64 * self.factor.max(0.0).powi(exponent);
        Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
    }
}

/// Run `op` until it succeeds or `options.tries` attempts have failed.
///
/// The error of the final attempt is returned unchanged.
///
/// # Errors
///
/// Returns the last error produced by `op` once all attempts are exhausted.
pub async fn backoff<T, E, F, Fut>(mut op: F, options: BackoffOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let tries = options.tries.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= tries => return Err(e),
            Err(e) => {
                let delay = options.delay_for(attempt);
                debug!(
                    "Attempt {}/{} failed: {e}; retrying in {}ms",
                    attempt + 1,
                    tries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
