//! Exponential backoff for transient failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::Result;

/// Backoff policy for transient errors (throttling, network, timeout).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay used for exponential backoff.
    pub base_delay: Duration,
    /// Backoff multiplier applied per retry attempt.
    pub backoff_factor: f64,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Add up to 25% random jitter per delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_attempts: 3,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry attempt (attempt 0 is the first
    /// retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let base = self.base_delay.as_millis() as f64 * factor;
        let with_jitter = if self.jitter {
            base * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            base
        };
        Duration::from_millis(with_jitter as u64)
    }
}

/// Run `op`, retrying transient errors per the config. Non-transient
/// errors surface immediately.
pub async fn retry_transient<T, F, Fut>(config: &RetryConfig, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < config.max_attempts => {
                let delay = config.delay_for(attempt);
                warn!(
                    label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_grow_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(config.delay_for(0), Duration::from_millis(500));
        assert_eq!(config.delay_for(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let config = RetryConfig::default();
        for _ in 0..50 {
            let delay = config.delay_for(0).as_millis();
            assert!((500..=625).contains(&delay), "delay {delay}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);

        let result = retry_transient(&config, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::throttled("store"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_the_last_error() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_transient(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Network("refused".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_transient(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Validation("bad input".into())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
