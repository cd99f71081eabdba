use crate::core::{Coordinate, Country, LookupKey};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Exact-key memo of provider answers.
///
/// Entries are insert-if-absent: once a key resolves, later writes for the
/// same key are ignored, so concurrent workers racing on one postcode leave
/// the first answer in place.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<LookupKey, Coordinate>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    postcode: String,
    country: Country,
    latitude: f64,
    longitude: f64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LookupKey) -> Option<Coordinate> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).copied()
    }

    /// Returns `true` when the key was newly stored.
    pub fn insert_if_absent(&self, key: LookupKey, coordinate: Coordinate) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, coordinate);
        true
    }

    pub fn contains(&self, key: &LookupKey) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes entries sorted by query text so the file diffs cleanly between runs.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<CacheEntry> = entries
            .iter()
            .map(|(key, coordinate)| CacheEntry {
                postcode: key.postcode().to_string(),
                country: key.country(),
                latitude: coordinate.latitude(),
                longitude: coordinate.longitude(),
            })
            .collect();
        rows.sort_by(|a, b| (a.country.as_str(), &a.postcode).cmp(&(b.country.as_str(), &b.postcode)));
        Ok(serde_json::to_vec_pretty(&rows)?)
    }

    /// Loads a cache written by [`ResolutionCache::to_json`]. Entries that no
    /// longer normalize or hold an invalid point are skipped.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let rows: Vec<CacheEntry> = serde_json::from_slice(bytes)?;
        let cache = Self::new();
        let mut skipped = 0usize;
        for row in rows {
            let key = LookupKey::new(&row.postcode, row.country).ok();
            let coordinate = Coordinate::new(row.latitude, row.longitude);
            match (key, coordinate) {
                (Some(key), Some(coordinate)) => {
                    cache.insert_if_absent(key, coordinate);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!("Skipped {} invalid cache entries", skipped);
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(postcode: &str, country: Country) -> LookupKey {
        LookupKey::new(postcode, country).unwrap()
    }

    #[test]
    fn test_insert_never_overwrites() {
        let cache = ResolutionCache::new();
        let first = Coordinate::new(51.501, -0.141).unwrap();
        let second = Coordinate::new(0.0, 0.0).unwrap();

        assert!(cache.insert_if_absent(key("SW1A 1AA", Country::Uk), first));
        assert!(!cache.insert_if_absent(key("sw1a1aa", Country::Uk), second));
        assert_eq!(cache.get(&key("SW1A 1AA", Country::Uk)), Some(first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_country_scoped() {
        let cache = ResolutionCache::new();
        cache.insert_if_absent(key("2000", Country::Australia), Coordinate::new(-33.87, 151.2).unwrap());
        assert!(cache.contains(&key("2000", Country::Australia)));
        assert!(!cache.contains(&key("2000", Country::Us)));
    }

    #[test]
    fn test_json_round_trip_keeps_entries() {
        let cache = ResolutionCache::new();
        cache.insert_if_absent(key("90210", Country::Us), Coordinate::new(34.09, -118.41).unwrap());
        cache.insert_if_absent(key("SW1A 1AA", Country::Uk), Coordinate::new(51.501, -0.141).unwrap());

        let restored = ResolutionCache::from_json(&cache.to_json().unwrap()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored.get(&key("90210", Country::Us)),
            Coordinate::new(34.09, -118.41)
        );
    }

    #[test]
    fn test_from_json_skips_bad_rows() {
        let json = br#"[
            {"postcode": "90210", "country": "US", "latitude": 34.09, "longitude": -118.41},
            {"postcode": "not-a-zip", "country": "US", "latitude": 1.0, "longitude": 1.0},
            {"postcode": "2000", "country": "Australia", "latitude": 200.0, "longitude": 1.0}
        ]"#;
        let cache = ResolutionCache::from_json(json).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
