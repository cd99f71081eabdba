use crate::core::resolver::ResolutionEngine;
use crate::core::{BatchReport, GeocodeProvider, Record, Resolution, ResolutionTier};
use crate::utils::error::{GeoError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const LATITUDE_FIELD: &str = "latitude";
pub const LONGITUDE_FIELD: &str = "longitude";
pub const TIER_FIELD: &str = "resolution_tier";

pub const DEFAULT_POSTCODE_COLUMN: &str = "postcode";
pub const DEFAULT_COUNTRY_COLUMN: &str = "country";

/// Runs the resolution engine over a whole dataset.
///
/// Each row resolves in its own task; an error or panic there marks that row
/// `UNRESOLVED` and the batch carries on. Output order always equals input order.
pub struct BatchDriver<P> {
    engine: Arc<ResolutionEngine<P>>,
    postcode_column: String,
    country_column: String,
    concurrency: usize,
}

impl<P: GeocodeProvider + 'static> BatchDriver<P> {
    pub fn new(engine: Arc<ResolutionEngine<P>>) -> Self {
        Self {
            engine,
            postcode_column: DEFAULT_POSTCODE_COLUMN.to_string(),
            country_column: DEFAULT_COUNTRY_COLUMN.to_string(),
            concurrency: 1,
        }
    }

    pub fn with_columns(mut self, postcode_column: &str, country_column: &str) -> Self {
        self.postcode_column = postcode_column.to_string();
        self.country_column = country_column.to_string();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn engine(&self) -> &ResolutionEngine<P> {
        &self.engine
    }

    pub async fn resolve_all(&self, rows: Vec<Record>) -> (Vec<Record>, BatchReport) {
        let mut report = BatchReport::start();
        let total = rows.len();
        tracing::info!(
            "Geocoding {} rows with {} worker(s)",
            total,
            self.concurrency
        );

        // a permit is taken before each spawn, so rows start in input order
        // and at most `concurrency` tasks are alive at once
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);
        for record in &rows {
            let postcode = field(record, &self.postcode_column);
            let country = field(record, &self.country_column);
            let permit = Arc::clone(&permits).acquire_owned().await;
            let engine = Arc::clone(&self.engine);
            handles.push(tokio::spawn(async move {
                let _permit = permit.map_err(|e| GeoError::ProcessingError {
                    message: format!("worker pool closed: {}", e),
                })?;
                resolve_row(&engine, postcode?, country?).await
            }));
        }

        let mut enriched = Vec::with_capacity(total);
        for (index, (record, handle)) in rows.into_iter().zip(handles).enumerate() {
            let resolution = match handle.await {
                Ok(Ok(resolution)) => {
                    report.record(index, &resolution);
                    resolution
                }
                Ok(Err(err)) => {
                    tracing::error!("Row {} failed: {}", index, err);
                    report.record_failure(index, err.to_string());
                    Resolution::unresolved()
                }
                Err(join_err) => {
                    tracing::error!("Row {} failed: worker aborted: {}", index, join_err);
                    report.record_failure(index, format!("worker aborted: {}", join_err));
                    Resolution::unresolved()
                }
            };
            enriched.push(enrich(record, &resolution));
        }

        report.finish();
        tracing::info!(
            "Completed. Failed rows: {}/{}",
            report.unresolved_rows.len(),
            total
        );
        if !report.fallback_rows.is_empty() || !report.centroid_rows.is_empty() {
            tracing::info!(
                "Degraded rows: {} fallback, {} centroid",
                report.fallback_rows.len(),
                report.centroid_rows.len()
            );
        }

        (enriched, report)
    }
}

fn field(record: &Record, column: &str) -> Result<String> {
    record
        .text(column)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| GeoError::malformed(column, "", "value is missing"))
}

async fn resolve_row<P: GeocodeProvider>(
    engine: &ResolutionEngine<P>,
    postcode: String,
    country: String,
) -> Result<Resolution> {
    let resolution = engine.resolve(&postcode, &country).await?;
    // the engine only gives up without an error for countries it has no rules for
    if resolution.tier == ResolutionTier::Unresolved {
        return Err(GeoError::UnsupportedCountry { country });
    }
    Ok(resolution)
}

fn coordinate_value(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

/// Appends latitude, longitude and tier; existing fields are left untouched.
pub fn enrich(mut record: Record, resolution: &Resolution) -> Record {
    let coordinate = resolution.coordinate;
    record.data.insert(
        LATITUDE_FIELD.to_string(),
        coordinate_value(coordinate.map(|c| c.latitude())),
    );
    record.data.insert(
        LONGITUDE_FIELD.to_string(),
        coordinate_value(coordinate.map(|c| c.longitude())),
    );
    record.data.insert(
        TIER_FIELD.to_string(),
        Value::String(resolution.tier.to_string()),
    );
    record
}
