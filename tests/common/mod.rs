#![allow(dead_code)]

use async_trait::async_trait;
use postcode_geocoder::core::retry::RetryPolicy;
use postcode_geocoder::core::{Coordinate, GeocodeProvider, Record};
use postcode_geocoder::{GeoError, ResolutionEngine, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Hit(f64, f64),
    Miss,
    Fail,
}

/// Scripted provider keyed by the exact query string. Unknown queries miss.
#[derive(Default)]
pub struct FakeProvider {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, query: &str, reply: Reply) -> Self {
        self.replies.insert(query.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, query: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|q| *q == query).count()
    }
}

#[async_trait]
impl GeocodeProvider for FakeProvider {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinate>> {
        self.calls.lock().unwrap().push(query.to_string());
        match self.replies.get(query).copied().unwrap_or(Reply::Miss) {
            Reply::Hit(lat, lon) => Ok(Coordinate::new(lat, lon)),
            Reply::Miss => Ok(None),
            Reply::Fail => Err(GeoError::transient("HTTP 503 Service Unavailable")),
        }
    }
}

pub fn fast_engine(provider: FakeProvider) -> ResolutionEngine<FakeProvider> {
    ResolutionEngine::new(provider, Duration::ZERO, RetryPolicy::without_backoff(3))
}

pub fn row(id: &str, postcode: &str, country: &str) -> Record {
    Record::from_pairs([("id", id), ("postcode", postcode), ("country", country)])
}
