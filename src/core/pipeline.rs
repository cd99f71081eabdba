use crate::core::batch::{BatchDriver, LATITUDE_FIELD, LONGITUDE_FIELD, TIER_FIELD};
use crate::core::cache::ResolutionCache;
use crate::core::rate_limit::RateLimitedClient;
use crate::core::resolver::ResolutionEngine;
use crate::core::retry::SingleLookupRetrier;
use crate::core::{
    ConfigProvider, Dataset, GeocodeProvider, Pipeline, Record, Storage, TransformResult,
};
use crate::utils::error::{GeoError, Result};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

/// CSV in, geocoded CSV plus JSON batch report out.
pub struct GeocodePipeline<S: Storage, C: ConfigProvider, P: GeocodeProvider> {
    storage: S,
    config: C,
    driver: BatchDriver<P>,
}

impl<S: Storage, C: ConfigProvider, P: GeocodeProvider + 'static> GeocodePipeline<S, C, P> {
    /// Builds the engine, seeding its cache from `config.cache_path()` when that file exists.
    pub async fn new(storage: S, config: C, provider: P) -> Self {
        let cache = match config.cache_path() {
            Some(path) => load_cache(&storage, path).await,
            None => ResolutionCache::new(),
        };

        let client = RateLimitedClient::new(provider, config.min_interval());
        let retrier = SingleLookupRetrier::new(client, config.retry_policy());
        let engine = ResolutionEngine::with_cache(retrier, cache);

        let driver = BatchDriver::new(Arc::new(engine))
            .with_columns(config.postcode_column(), config.country_column())
            .with_concurrency(config.concurrent_requests());

        Self {
            storage,
            config,
            driver,
        }
    }

    pub fn engine(&self) -> &ResolutionEngine<P> {
        self.driver.engine()
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    async fn save_cache(&self) -> Result<()> {
        if let Some(path) = self.config.cache_path() {
            let cache = self.engine().cache();
            self.storage.write_file(path, &cache.to_json()?).await?;
            tracing::info!("Saved {} cached postcodes to {}", cache.len(), path);
        }
        Ok(())
    }
}

async fn load_cache<S: Storage>(storage: &S, path: &str) -> ResolutionCache {
    if !storage.exists(path).await {
        tracing::info!("No geocode cache at {}, starting empty", path);
        return ResolutionCache::new();
    }

    let loaded = match storage.read_file(path).await {
        Ok(bytes) => ResolutionCache::from_json(&bytes),
        Err(e) => Err(e),
    };
    match loaded {
        Ok(cache) => {
            tracing::info!("Loaded {} cached postcodes from {}", cache.len(), path);
            cache
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable geocode cache {}: {}", path, e);
            ResolutionCache::new()
        }
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Dataset> {
    // ragged rows are kept; their missing cells fail only that row later
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let data = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.clone(), Value::String(value.to_string())))
            .collect();
        records.push(Record { data });
    }

    Ok(Dataset { headers, records })
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn write_csv(headers: &[String], records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for record in records {
        writer.write_record(headers.iter().map(|h| cell(record.data.get(h))))?;
    }
    writer
        .into_inner()
        .map_err(|e| GeoError::IoError(e.into_error()))
}

fn zip_name(csv_name: &str) -> String {
    let stem = Path::new(csv_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("geocoded_dataset");
    format!("{}.zip", stem)
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, P: GeocodeProvider + 'static> Pipeline
    for GeocodePipeline<S, C, P>
{
    async fn extract(&self) -> Result<Dataset> {
        let path = self.config.input_path();
        tracing::debug!("Reading dataset from: {}", path);
        let bytes = self.storage.read_file(path).await?;
        let dataset = parse_csv(&bytes)?;

        for column in [self.config.postcode_column(), self.config.country_column()] {
            if !dataset.headers.iter().any(|h| h == column) {
                return Err(GeoError::ConfigValidationError {
                    field: "input columns".to_string(),
                    message: format!(
                        "column '{}' not found in {} (found: {})",
                        column,
                        path,
                        dataset.headers.join(", ")
                    ),
                });
            }
        }

        Ok(dataset)
    }

    async fn transform(&self, data: Dataset) -> Result<TransformResult> {
        let Dataset {
            mut headers,
            records,
        } = data;

        let (records, report) = self.driver.resolve_all(records).await;

        for column in [LATITUDE_FIELD, LONGITUDE_FIELD, TIER_FIELD] {
            if !headers.iter().any(|h| h == column) {
                headers.push(column.to_string());
            }
        }

        Ok(TransformResult {
            headers,
            records,
            report,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let csv_data = write_csv(&result.headers, &result.records)?;
        let report_data = serde_json::to_vec_pretty(&result.report)?;

        let output_path = if self.config.compress_output() {
            let archive_path = self.output_file(&zip_name(self.config.output_filename()));
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

                zip.start_file::<_, ()>(self.config.output_filename(), FileOptions::default())?;
                zip.write_all(&csv_data)?;

                zip.start_file::<_, ()>(self.config.report_filename(), FileOptions::default())?;
                zip.write_all(&report_data)?;

                zip.finish()?.into_inner()
            };
            tracing::debug!("Writing archive ({} bytes) to {}", zip_data.len(), archive_path);
            self.storage.write_file(&archive_path, &zip_data).await?;
            archive_path
        } else {
            let csv_path = self.output_file(self.config.output_filename());
            let report_path = self.output_file(self.config.report_filename());
            self.storage.write_file(&csv_path, &csv_data).await?;
            self.storage.write_file(&report_path, &report_data).await?;
            tracing::debug!("Batch report written to {}", report_path);
            csv_path
        };

        self.save_cache().await?;
        Ok(output_path)
    }
}
