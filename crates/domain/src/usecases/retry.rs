//! Bounded exponential backoff around rate-limited feed calls

use std::future::Future;

use tokio::time::{Duration, sleep};

use crate::ports::FeedError;

/// Retry policy for rate-limited (HTTP 429) responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Counters accumulated across retried calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub retried: u32,
    pub rate_limit_hits: u32,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op`, retrying only while it reports a rate limit.
    ///
    /// Every rate-limited attempt counts as a hit; every sleep-and-retry counts
    /// as a retry. Other errors and exhaustion are returned as-is.
    pub async fn run<T, F, Fut>(&self, stats: &mut RetryStats, mut op: F) -> Result<T, FeedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(FeedError::RateLimited(hint)) => {
                    stats.rate_limit_hits += 1;
                    if attempt >= self.max_retries {
                        tracing::warn!(attempts = attempt + 1, "Rate limit retries exhausted");
                        return Err(FeedError::RateLimited(hint));
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        retry_after = ?hint,
                        "Rate limited, backing off"
                    );
                    sleep(delay).await;
                    stats.retried += 1;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }

    #[test]
    fn test_delays_double() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_secs(2));
        assert_eq!(p.delay_for(1), Duration::from_secs(4));
        assert_eq!(p.delay_for(2), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_retries_exactly_max_times_with_increasing_delay() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let mut stats = RetryStats::default();

        let result: Result<(), FeedError> = policy()
            .run(&mut stats, || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(Instant::now());
                    Err(FeedError::RateLimited(None))
                }
            })
            .await;

        assert!(matches!(result, Err(FeedError::RateLimited(_))));
        assert_eq!(stats.retried, 3);
        assert_eq!(stats.rate_limit_hits, 4);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
        assert!(gaps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let attempts = Arc::new(Mutex::new(0u32));
        let mut stats = RetryStats::default();

        let result = policy()
            .run(&mut stats, || {
                let attempts = Arc::clone(&attempts);
                async move {
                    let mut n = attempts.lock().unwrap();
                    *n += 1;
                    if *n < 3 {
                        Err(FeedError::RateLimited(None))
                    } else {
                        Ok(*n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.rate_limit_hits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_fail_immediately() {
        let attempts = Arc::new(Mutex::new(0u32));
        let mut stats = RetryStats::default();

        let result: Result<(), FeedError> = policy()
            .run(&mut stats, || {
                let attempts = Arc::clone(&attempts);
                async move {
                    *attempts.lock().unwrap() += 1;
                    Err(FeedError::Api {
                        status: 500,
                        message: "boom".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(FeedError::Api { status: 500, .. })));
        assert_eq!(*attempts.lock().unwrap(), 1);
        assert_eq!(stats, RetryStats::default());
    }
}
