use crate::core::cache::ResolutionCache;
use crate::core::centroid::country_centroid;
use crate::core::fallback::nearby_keys;
use crate::core::rate_limit::RateLimitedClient;
use crate::core::retry::{RetryPolicy, SingleLookupRetrier};
use crate::core::{Coordinate, Country, GeocodeProvider, LookupKey, Resolution};
use crate::utils::error::Result;
use std::time::Duration;

/// Cascade of exact lookup, nearby postcodes and country centroid for one pair.
///
/// Only exact-key hits are written to the cache. A fallback coordinate belongs
/// to a different postcode and must not be served for the original one later.
pub struct ResolutionEngine<P> {
    retrier: SingleLookupRetrier<P>,
    cache: ResolutionCache,
}

enum Attempt {
    Found(Coordinate),
    Empty,
    Errored,
}

impl<P: GeocodeProvider> ResolutionEngine<P> {
    pub fn new(provider: P, min_interval: Duration, policy: RetryPolicy) -> Self {
        let client = RateLimitedClient::new(provider, min_interval);
        Self::with_cache(SingleLookupRetrier::new(client, policy), ResolutionCache::new())
    }

    pub fn with_cache(retrier: SingleLookupRetrier<P>, cache: ResolutionCache) -> Self {
        Self { retrier, cache }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn provider(&self) -> &P {
        self.retrier.client().provider()
    }

    /// Resolves a raw row pair.
    ///
    /// Unsupported countries come back as `UNRESOLVED` without touching the
    /// provider. The only error is `MalformedInput` for a postcode that cannot
    /// be normalized.
    pub async fn resolve(&self, postcode: &str, country: &str) -> Result<Resolution> {
        let Some(parsed) = Country::parse(country) else {
            tracing::warn!("Unsupported country '{}' for postcode {}", country, postcode);
            return Ok(Resolution::unresolved());
        };
        let key = LookupKey::new(postcode, parsed)?;
        Ok(self.resolve_key(&key).await)
    }

    pub async fn resolve_key(&self, key: &LookupKey) -> Resolution {
        if let Some(coordinate) = self.cache.get(key) {
            tracing::debug!("Cache hit: {}", key);
            return Resolution::exact(coordinate);
        }

        let mut failures = 0u32;

        match self.attempt(key).await {
            Attempt::Found(coordinate) => {
                self.cache.insert_if_absent(key.clone(), coordinate);
                return Resolution::exact(coordinate);
            }
            Attempt::Empty => {}
            Attempt::Errored => {
                failures += 1;
                tracing::warn!("Primary geocoding failed for {}. Attempting fallbacks...", key);
            }
        }

        for candidate in nearby_keys(key) {
            let found = match self.cache.get(&candidate) {
                Some(coordinate) => Attempt::Found(coordinate),
                None => self.attempt(&candidate).await,
            };
            match found {
                Attempt::Found(coordinate) => {
                    tracing::info!("Used fallback: {} -> {}", key.postcode(), candidate.postcode());
                    return Resolution::fallback(coordinate, candidate.postcode())
                        .with_provider_failures(failures);
                }
                Attempt::Empty => {}
                Attempt::Errored => failures += 1,
            }
        }

        let centroid = country_centroid(key.country());
        tracing::warn!("Using country centroid for {}", key);
        Resolution::centroid(centroid).with_provider_failures(failures)
    }

    async fn attempt(&self, key: &LookupKey) -> Attempt {
        match self.retrier.resolve_once(key).await {
            Ok(Some(coordinate)) => Attempt::Found(coordinate),
            Ok(None) => Attempt::Empty,
            Err(err) => {
                tracing::error!("Lookup failed for {}: {}", key, err);
                Attempt::Errored
            }
        }
    }
}
