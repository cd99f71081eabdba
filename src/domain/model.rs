use crate::utils::error::{GeoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let data = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
            .collect();
        Self { data }
    }

    /// Text form of a field. Numbers keep their JSON rendering (`90210.0` stays `90210.0`).
    pub fn text(&self, field: &str) -> Option<String> {
        match self.data.get(field)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A tabular dataset: header order plus rows keyed by header.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    pub report: BatchReport,
}

/// A WGS84 point. Absence is modelled as `Option<Coordinate>`, never as half a point.
///
/// Only [`Coordinate::new`] builds one, so every value is finite and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// `None` unless latitude is in `[-90, 90]` and longitude in `[-180, 180]`.
    /// NaN fails every comparison, infinities fail the bounds.
    pub const fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if latitude >= -90.0 && latitude <= 90.0 && longitude >= -180.0 && longitude <= 180.0 {
            Some(Self {
                latitude,
                longitude,
            })
        } else {
            None
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "UK")]
    Uk,
    #[serde(rename = "US")]
    Us,
    Australia,
}

impl Country {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "uk" | "gb" | "united kingdom" | "great britain" => Some(Country::Uk),
            "us" | "usa" | "united states" => Some(Country::Us),
            "australia" | "au" => Some(Country::Australia),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Uk => "UK",
            Country::Us => "US",
            Country::Australia => "Australia",
        }
    }

    /// Digit count of numeric postcodes; `None` for alphanumeric systems.
    pub fn numeric_width(&self) -> Option<usize> {
        match self {
            Country::Uk => None,
            Country::Us => Some(5),
            Country::Australia => Some(4),
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized `(postcode, country)` pair used for cache and provider lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupKey {
    postcode: String,
    country: Country,
}

impl LookupKey {
    pub fn new(postcode: &str, country: Country) -> Result<Self> {
        let trimmed = postcode.trim();
        if trimmed.is_empty() {
            return Err(GeoError::malformed("postcode", postcode, "postcode is empty"));
        }

        let postcode = match country.numeric_width() {
            None => normalize_uk(trimmed)?,
            Some(width) => normalize_numeric(trimmed, width)?,
        };
        Ok(Self { postcode, country })
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    pub fn country(&self) -> Country {
        self.country
    }

    /// Free-text query sent to the provider.
    pub fn query(&self) -> String {
        format!("{}, {}", self.postcode, self.country)
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.postcode, self.country)
    }
}

fn normalize_uk(raw: &str) -> Result<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GeoError::malformed(
            "postcode",
            raw,
            "UK postcodes may only contain letters and digits",
        ));
    }

    if compact.len() > 3 {
        let (outward, inward) = compact.split_at(compact.len() - 3);
        Ok(format!("{} {}", outward, inward))
    } else {
        Ok(compact)
    }
}

fn normalize_numeric(raw: &str, width: usize) -> Result<String> {
    // ZIP+4 and similar suffixes carry no extra precision for a centroid-level lookup
    let base = raw.split('-').next().unwrap_or(raw).trim();

    let digits = if !base.is_empty() && base.chars().all(|c| c.is_ascii_digit()) {
        base.to_string()
    } else {
        // upstream numeric parsing turns 2000 into "2000.0" and drops leading zeros
        let value: f64 = base
            .parse()
            .map_err(|_| GeoError::malformed("postcode", raw, "expected a numeric postcode"))?;
        if !value.is_finite() || value < 0.0 || value >= 1e9 {
            return Err(GeoError::malformed(
                "postcode",
                raw,
                "numeric postcode out of range",
            ));
        }
        format!("{}", value.trunc() as u64)
    };

    Ok(format!("{:0>width$}", digits, width = width))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionTier {
    Exact,
    Fallback,
    Centroid,
    Unresolved,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Exact => "EXACT",
            ResolutionTier::Fallback => "FALLBACK",
            ResolutionTier::Centroid => "CENTROID",
            ResolutionTier::Unresolved => "UNRESOLVED",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one `(postcode, country)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub coordinate: Option<Coordinate>,
    pub tier: ResolutionTier,
    /// The fallback postcode that produced the coordinate.
    pub matched_postcode: Option<String>,
    /// Lookups in this cascade that ended with retries exhausted.
    pub provider_failures: u32,
}

impl Resolution {
    pub fn exact(coordinate: Coordinate) -> Self {
        Self {
            coordinate: Some(coordinate),
            tier: ResolutionTier::Exact,
            matched_postcode: None,
            provider_failures: 0,
        }
    }

    pub fn fallback(coordinate: Coordinate, matched_postcode: &str) -> Self {
        Self {
            coordinate: Some(coordinate),
            tier: ResolutionTier::Fallback,
            matched_postcode: Some(matched_postcode.to_string()),
            provider_failures: 0,
        }
    }

    pub fn centroid(coordinate: Coordinate) -> Self {
        Self {
            coordinate: Some(coordinate),
            tier: ResolutionTier::Centroid,
            matched_postcode: None,
            provider_failures: 0,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            coordinate: None,
            tier: ResolutionTier::Unresolved,
            matched_postcode: None,
            provider_failures: 0,
        }
    }

    pub fn with_provider_failures(mut self, failures: u32) -> Self {
        self.provider_failures = failures;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    pub index: usize,
    pub reason: String,
}

/// Per-batch summary. Row indices are 0-based positions in the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_rows: usize,
    pub exact_rows: usize,
    pub fallback_rows: Vec<usize>,
    pub centroid_rows: Vec<usize>,
    pub unresolved_rows: Vec<usize>,
    /// Rows where at least one lookup errored out rather than coming back empty.
    pub provider_error_rows: Vec<usize>,
    pub failures: Vec<RowFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    pub fn start() -> Self {
        Self {
            total_rows: 0,
            exact_rows: 0,
            fallback_rows: Vec::new(),
            centroid_rows: Vec::new(),
            unresolved_rows: Vec::new(),
            provider_error_rows: Vec::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, index: usize, resolution: &Resolution) {
        self.total_rows += 1;
        match resolution.tier {
            ResolutionTier::Exact => self.exact_rows += 1,
            ResolutionTier::Fallback => self.fallback_rows.push(index),
            ResolutionTier::Centroid => self.centroid_rows.push(index),
            ResolutionTier::Unresolved => self.unresolved_rows.push(index),
        }
        if resolution.provider_failures > 0 {
            self.provider_error_rows.push(index);
        }
    }

    pub fn record_failure(&mut self, index: usize, reason: impl Into<String>) {
        self.total_rows += 1;
        self.unresolved_rows.push(index);
        self.failures.push(RowFailure {
            index,
            reason: reason.into(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn resolved_rows(&self) -> usize {
        self.total_rows - self.unresolved_rows.len()
    }
}
