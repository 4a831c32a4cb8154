//! Backoff for broker start-up and log throttling for the consumer loop.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Doubling backoff, capped, with a bounded number of retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub label: &'static str,
    pub retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(label: &'static str, retries: u32, base: Duration, cap: Duration) -> Self {
        Self {
            label,
            retries,
            base,
            cap,
        }
    }

    /// Brokers in compose set-ups routinely come up after the workers.
    pub fn startup(label: &'static str) -> Self {
        Self::new(label, 10, Duration::from_millis(500), Duration::from_secs(10))
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.cap)
    }
}

/// Run `operation` until it succeeds or the policy's retries are spent,
/// returning the last error in that case.
pub async fn with_retries<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.retries => return Err(e),
            Err(e) => e,
        };
        attempt += 1;
        let delay = policy.delay(attempt);
        warn!(
            operation = policy.label,
            attempt,
            retry_in = ?delay,
            error = %error,
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Lets the first few consecutive failures through to the log, then goes
/// quiet until the next success.
#[derive(Debug)]
pub struct LogThrottle {
    limit: u32,
    streak: u32,
}

impl LogThrottle {
    pub fn new(limit: u32) -> Self {
        Self { limit, streak: 0 }
    }

    /// Count a failure; `true` when it should be logged.
    pub fn failed(&mut self) -> bool {
        self.streak += 1;
        if self.streak == self.limit + 1 {
            warn!(failures = self.limit, "Further failures suppressed until recovery");
        }
        self.streak <= self.limit
    }

    pub fn recovered(&mut self) {
        if self.streak > self.limit {
            debug!(failures = self.streak, "Recovered");
        }
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy::new("test", retries, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = quick(3);
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(RetryPolicy::startup("broker").delay(40), Duration::from_secs(10));
    }

    #[test]
    fn test_throttle_goes_quiet_until_recovery() {
        let mut throttle = LogThrottle::new(2);
        assert!(throttle.failed());
        assert!(throttle.failed());
        assert!(!throttle.failed());
        assert!(!throttle.failed());
        assert_eq!(throttle.streak(), 4);

        throttle.recovered();
        assert_eq!(throttle.streak(), 0);
        assert!(throttle.failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retries_recovers() {
        let calls = AtomicU32::new(0);

        let result = with_retries(&quick(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("attempt {}", n))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retries_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retries(&quick(2), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("down {}", n)) }
        })
        .await;

        assert_eq!(result, Err("down 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
