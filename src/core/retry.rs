//! Bounded exponential-backoff retry for a single provider lookup.
//!
//! Only transient failures are retried. A "no match" answer is a result, not a
//! failure, and comes back on the first attempt.

use crate::core::rate_limit::RateLimitedClient;
use crate::core::{Coordinate, GeocodeProvider, LookupKey};
use crate::utils::error::{GeoError, Result};
use std::future::Future;
use std::time::Duration;

/// Wait before retry `n` (0-based) is `clamp(multiplier * 2^n seconds, min_wait, max_wait)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: f64,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1.0,
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: 0.0,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.min(62) as i32);
        let raw = Duration::try_from_secs_f64(self.multiplier * exp).unwrap_or(self.max_wait);
        raw.max(self.min_wait).min(self.max_wait)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or `policy.max_attempts`
/// is spent. Exhaustion yields [`GeoError::RetryExhausted`] naming `label`.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => err,
        };

        tracing::error!(
            "Geocoding attempt {}/{} failed for {}: {}",
            attempt + 1,
            max_attempts,
            label,
            err
        );

        if attempt + 1 >= max_attempts {
            return Err(GeoError::RetryExhausted {
                key: label.to_string(),
                attempts: max_attempts,
                last_error: err.to_string(),
            });
        }

        let delay = policy.backoff(attempt);
        tracing::debug!("Retrying {} in {:?}", label, delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

pub struct SingleLookupRetrier<P> {
    client: RateLimitedClient<P>,
    policy: RetryPolicy,
}

impl<P: GeocodeProvider> SingleLookupRetrier<P> {
    pub fn new(client: RateLimitedClient<P>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &RateLimitedClient<P> {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn resolve_once(&self, key: &LookupKey) -> Result<Option<Coordinate>> {
        let label = key.to_string();
        let found = retry_with_backoff(&self.policy, &label, || self.client.lookup(key)).await?;
        match found {
            Some(coordinate) => tracing::info!("Geocoded: {} -> {}", label, coordinate),
            None => tracing::warn!("No results for: {}", label),
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Country;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    /// Plays back scripted answers; once the script runs out it keeps returning the last one.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Option<Coordinate>>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Option<Coordinate>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GeocodeProvider for ScriptedProvider {
        async fn geocode(&self, _query: &str) -> Result<Option<Coordinate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                match script.front() {
                    Some(Ok(found)) => Ok(*found),
                    _ => Err(GeoError::transient("HTTP 503")),
                }
            }
        }
    }

    fn retrier(script: Vec<Result<Option<Coordinate>>>, policy: RetryPolicy) -> SingleLookupRetrier<ScriptedProvider> {
        let client = RateLimitedClient::new(ScriptedProvider::new(script), Duration::ZERO);
        SingleLookupRetrier::new(client, policy)
    }

    fn key() -> LookupKey {
        LookupKey::new("SW1A 1AA", Country::Uk).unwrap()
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(4));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(200), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_multiplier_scales_wait() {
        let policy = RetryPolicy {
            multiplier: 3.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(4));
        assert_eq!(policy.backoff(1), Duration::from_secs(6));
        assert_eq!(policy.backoff(2), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let coord = Coordinate::new(51.501, -0.141).unwrap();
        let retrier = retrier(vec![Ok(Some(coord))], RetryPolicy::without_backoff(3));

        let found = assert_ok!(retrier.resolve_once(&key()).await);
        assert_eq!(found, Some(coord));
        assert_eq!(retrier.client().provider().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_not_retried() {
        let retrier = retrier(vec![Ok(None)], RetryPolicy::without_backoff(3));

        let found = assert_ok!(retrier.resolve_once(&key()).await);
        assert_eq!(found, None);
        assert_eq!(retrier.client().provider().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_errors() {
        let coord = Coordinate::new(51.501, -0.141).unwrap();
        let retrier = retrier(
            vec![
                Err(GeoError::transient("timeout")),
                Err(GeoError::transient("HTTP 502")),
                Ok(Some(coord)),
            ],
            RetryPolicy::without_backoff(3),
        );

        assert_eq!(retrier.resolve_once(&key()).await.unwrap(), Some(coord));
        assert_eq!(retrier.client().provider().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_three_attempts_with_backoff() {
        let retrier = retrier(vec![Err(GeoError::transient("HTTP 503"))], RetryPolicy::default());

        let start = Instant::now();
        let err = assert_err!(retrier.resolve_once(&key()).await);
        match err {
            GeoError::RetryExhausted { key, attempts, last_error } => {
                assert_eq!(key, "SW1A 1AA, UK");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
        assert_eq!(retrier.client().provider().calls.load(Ordering::SeqCst), 3);
        // two waits of 4s between three attempts, none after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(8) && elapsed < Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_permanent_error_is_returned_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = retry_with_backoff(&RetryPolicy::without_backoff(3), "row", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(GeoError::malformed("postcode", "XYZ", "expected a numeric postcode"))
            }
        })
        .await;

        assert!(matches!(result, Err(GeoError::MalformedInput { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
