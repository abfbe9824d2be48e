//! Call-budget enforcement for outbound API requests
//!
//! The limiter tracks a strict sliding window of call start times per minute
//! and per hour, caps in-flight requests, and applies an exponential backoff
//! delay after marked failures. Callers bracket every request between
//! [`RateLimiter::await_slot`] and [`RateLimiter::mark_end`].
//!
//! State is private per instance: each collector owns its own limiter and
//! nothing is shared across instances. A token-bucket (GCRA) limiter cannot
//! guarantee the strict at-most-N-per-window bound required here, so the
//! window is an explicit timestamp log.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use crate::config::LimiterConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Base backoff delay in seconds; restored on every success
const BASE_BACKOFF_SECS: f64 = 1.0;

/// Timestamp logs for both sliding windows, pruned on every check.
///
/// Both windows live under one lock so a slot is reserved in the minute and
/// hour logs atomically.
struct WindowLog {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl WindowLog {
    fn prune(&mut self, now: Instant) {
        while let Some(&t) = self.minute.front() {
            if now.duration_since(t) >= MINUTE {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        while let Some(&t) = self.hour.front() {
            if now.duration_since(t) >= HOUR {
                self.hour.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long until a new call start would fit in both windows
    fn wait_for_slot(&self, now: Instant, per_minute: usize, per_hour: usize) -> Duration {
        let minute_wait = if self.minute.len() < per_minute {
            Duration::ZERO
        } else {
            MINUTE - now.duration_since(self.minute[self.minute.len() - per_minute])
        };
        let hour_wait = if self.hour.len() < per_hour {
            Duration::ZERO
        } else {
            HOUR - now.duration_since(self.hour[self.hour.len() - per_hour])
        };
        minute_wait.max(hour_wait)
    }
}

struct BackoffState {
    /// Delay applied while failing, in seconds
    delay_secs: f64,
    /// Set after a marked failure, cleared on success
    failing: bool,
}

/// Sliding-window rate limiter with per-request backoff.
///
/// # Usage
///
/// ```no_run
/// # use gleaner::limiter::RateLimiter;
/// # async fn example(limiter: &RateLimiter) {
/// limiter.await_slot().await;
/// let ok = true; // issue the request here
/// limiter.mark_end(ok).await;
/// # }
/// ```
pub struct RateLimiter {
    windows: Mutex<WindowLog>,
    in_flight: Arc<Semaphore>,
    backoff: Mutex<BackoffState>,
    per_minute: usize,
    per_hour: usize,
    backoff_multiplier: f64,
    max_backoff_secs: f64,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            windows: Mutex::new(WindowLog {
                minute: VecDeque::new(),
                hour: VecDeque::new(),
            }),
            in_flight: Arc::new(Semaphore::new(config.concurrent_requests)),
            backoff: Mutex::new(BackoffState {
                delay_secs: BASE_BACKOFF_SECS,
                failing: false,
            }),
            per_minute: config.max_calls_per_minute as usize,
            per_hour: config.max_calls_per_hour as usize,
            backoff_multiplier: config.backoff_multiplier,
            max_backoff_secs: config.max_backoff_secs,
        }
    }

    /// Block until issuing a call would not exceed either window budget and
    /// fewer than `concurrent_requests` calls are in flight.
    ///
    /// While the limiter is in a failing state the current backoff delay is
    /// slept before the window check.
    pub async fn await_slot(&self) {
        let permit = self
            .in_flight
            .acquire()
            .await
            .expect("limiter semaphore closed");
        // Slot ownership is transferred to mark_end, which returns it.
        permit.forget();

        let backoff_delay = {
            let backoff = self.backoff.lock().await;
            backoff.failing.then(|| Duration::from_secs_f64(backoff.delay_secs))
        };
        if let Some(delay) = backoff_delay {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Backoff sleep");
            tokio::time::sleep(delay).await;
        }

        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let now = Instant::now();
                windows.prune(now);
                let wait = windows.wait_for_slot(now, self.per_minute, self.per_hour);
                if wait.is_zero() {
                    windows.minute.push_back(now);
                    windows.hour.push_back(now);
                    return;
                }
                wait
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Window budget exhausted");
            tokio::time::sleep(wait).await;
        }
    }

    /// Release the in-flight slot and update backoff state.
    ///
    /// Success resets the delay to its base value; failure multiplies it by
    /// `backoff_multiplier`, capped at `max_backoff_secs`.
    pub async fn mark_end(&self, success: bool) {
        self.in_flight.add_permits(1);

        let mut backoff = self.backoff.lock().await;
        if success {
            backoff.delay_secs = BASE_BACKOFF_SECS;
            backoff.failing = false;
        } else {
            backoff.delay_secs =
                (backoff.delay_secs * self.backoff_multiplier).min(self.max_backoff_secs);
            backoff.failing = true;
        }
    }

    /// Current backoff delay in seconds (observability)
    pub async fn current_backoff_secs(&self) -> f64 {
        self.backoff.lock().await.delay_secs
    }

    /// In-flight slots still available (observability)
    pub fn available_slots(&self) -> usize {
        self.in_flight.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_config(per_minute: u32, per_hour: u32, concurrent: usize) -> LimiterConfig {
        LimiterConfig {
            max_calls_per_minute: per_minute,
            max_calls_per_hour: per_hour,
            concurrent_requests: concurrent,
            backoff_multiplier: 2.0,
            max_backoff_secs: 60.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_window_blocks_excess_calls() {
        let limiter = RateLimiter::new(&limiter_config(3, 100, 10));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.await_slot().await;
            limiter.mark_end(true).await;
        }
        // First three slots granted without any time passing
        assert_eq!(start.elapsed(), Duration::ZERO);

        // The fourth must wait out the sliding minute
        limiter.await_slot().await;
        assert!(start.elapsed() >= MINUTE);
        limiter.mark_end(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hour_window_blocks_excess_calls() {
        let limiter = RateLimiter::new(&limiter_config(2, 3, 10));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.await_slot().await;
            limiter.mark_end(true).await;
        }
        // Third call already waited on the minute window; fourth must wait
        // for the hour budget.
        limiter.await_slot().await;
        assert!(start.elapsed() >= HOUR);
        limiter.mark_end(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_growth_and_cap() {
        let limiter = RateLimiter::new(&limiter_config(100, 1000, 10));

        limiter.await_slot().await;
        limiter.mark_end(false).await;
        assert_eq!(limiter.current_backoff_secs().await, 2.0);

        limiter.await_slot().await;
        limiter.mark_end(false).await;
        limiter.await_slot().await;
        limiter.mark_end(false).await;
        // Three consecutive failures: 1.0 * 2^3
        assert_eq!(limiter.current_backoff_secs().await, 8.0);

        // Growth is capped
        for _ in 0..10 {
            limiter.await_slot().await;
            limiter.mark_end(false).await;
        }
        assert_eq!(limiter.current_backoff_secs().await, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_resets_on_success() {
        let limiter = RateLimiter::new(&limiter_config(100, 1000, 10));

        limiter.await_slot().await;
        limiter.mark_end(false).await;
        limiter.await_slot().await;
        limiter.mark_end(true).await;

        assert_eq!(limiter.current_backoff_secs().await, BASE_BACKOFF_SECS);

        // No backoff sleep after success: slot is granted instantly
        let start = Instant::now();
        limiter.await_slot().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        limiter.mark_end(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_delays_next_slot() {
        let limiter = RateLimiter::new(&limiter_config(100, 1000, 10));

        limiter.await_slot().await;
        limiter.mark_end(false).await;

        // Next wait strictly includes the current backoff (2.0s after one
        // failure).
        let start = Instant::now();
        limiter.await_slot().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        limiter.mark_end(true).await;
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let limiter = Arc::new(RateLimiter::new(&limiter_config(100, 1000, 2)));

        limiter.await_slot().await;
        limiter.await_slot().await;
        assert_eq!(limiter.available_slots(), 0);

        limiter.mark_end(true).await;
        assert_eq!(limiter.available_slots(), 1);
        limiter.mark_end(true).await;
        assert_eq!(limiter.available_slots(), 2);
    }
}
