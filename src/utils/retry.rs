//! Retry helper with exponential backoff
//!
//! Used by scheduler jobs (re-running a failed phase within the retry
//! budget) and by storage-adjacent operations that hit transient errors.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means run once)
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with custom max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a retry configuration with custom delays
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before the given attempt (attempt 0 runs immediately)
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = if attempt == 0 {
            0
        } else {
            let exponential =
                self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }
}

/// Execute an operation with retry and exponential backoff.
///
/// Returns `Ok(T)` on the first success, or the last error once the retry
/// budget is spent.
///
/// # Example
///
/// ```no_run
/// use gleaner::utils::retry::{with_retry, RetryConfig};
/// use anyhow::Result;
///
/// async fn flaky() -> Result<u32> {
///     Ok(42)
/// }
///
/// # async fn example() -> Result<()> {
/// let value = with_retry(&RetryConfig::new(2), || async { flaky().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.calculate_delay(attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "Operation failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Operation failed with no error details")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_growth_and_cap() {
        let config = RetryConfig::with_delays(5, 1000, 4000);
        assert_eq!(config.calculate_delay(0), Duration::ZERO);
        assert_eq!(config.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(4000));
        // Capped
        assert_eq!(config.calculate_delay(4), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::new(3);

        let result = with_retry(&config, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("transient");
            }
            Ok(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_returns_last_error() {
        let config = RetryConfig::new(1);
        let result: Result<()> =
            with_retry(&config, || async { anyhow::bail!("always broken") }).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("always broken"));
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::new(0);

        let _: Result<()> = with_retry(&config, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("nope");
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
