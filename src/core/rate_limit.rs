use crate::core::{Coordinate, GeocodeProvider, LookupKey};
use crate::utils::error::Result;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Enforces a minimum gap between consecutive calls across all callers.
///
/// The lock is held through the sleep, so waiters are released one at a time
/// and each sees the timestamp its predecessor left behind.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(prev) = *last_call {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

/// Provider handle that throttles every call through one [`RateLimiter`].
pub struct RateLimitedClient<P> {
    provider: P,
    limiter: RateLimiter,
}

impl<P: GeocodeProvider> RateLimitedClient<P> {
    pub fn new(provider: P, min_interval: Duration) -> Self {
        Self {
            provider,
            limiter: RateLimiter::new(min_interval),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// One provider call. `Ok(None)` is a definitive "no match".
    pub async fn lookup(&self, key: &LookupKey) -> Result<Option<Coordinate>> {
        self.limiter.wait().await;
        let query = key.query();
        tracing::debug!("Geocoding query: {}", query);
        self.provider.geocode(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Country;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StampingProvider {
        calls: std::sync::Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl GeocodeProvider for StampingProvider {
        async fn geocode(&self, _query: &str) -> Result<Option<Coordinate>> {
            self.calls.lock().unwrap().push(Instant::now());
            Ok(None)
        }
    }

    fn provider() -> StampingProvider {
        StampingProvider {
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_are_spaced() {
        let client = RateLimitedClient::new(provider(), Duration::from_millis(50));
        let key = LookupKey::new("90210", Country::Us).unwrap();

        let start = Instant::now();
        for _ in 0..4 {
            client.lookup(&key).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(150));

        let calls = client.provider().calls.lock().unwrap().clone();
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_interval() {
        let client = Arc::new(RateLimitedClient::new(provider(), Duration::from_millis(50)));

        let mut handles = Vec::new();
        for i in 0..8 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move {
                let key = LookupKey::new(&format!("9021{}", i), Country::Us).unwrap();
                client.lookup(&key).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut calls = client.provider().calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls.len(), 8);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_not_delayed() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.min_interval(), DEFAULT_MIN_INTERVAL);
    }
}
