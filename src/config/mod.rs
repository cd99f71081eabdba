#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::TomlConfig;

use crate::core::ConfigProvider;
use crate::utils::error::{GeoError, Result};
use crate::utils::validation::{
    validate_extension, validate_file_name, validate_non_empty_string, validate_path,
    validate_positive_number, validate_range, validate_url,
};
use std::time::Duration;

pub const DEFAULT_INPUT_PATH: &str = "original_dataset.csv";
pub const DEFAULT_OUTPUT_PATH: &str = ".";
pub const DEFAULT_OUTPUT_FILENAME: &str = "geocoded_dataset.csv";
pub const DEFAULT_REPORT_FILENAME: &str = "batch_report.json";
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 4;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 10;
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 1;

/// Checks shared by every configuration source.
pub fn validate_settings<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_url("geocoder.endpoint", config.provider_endpoint())?;
    validate_non_empty_string("geocoder.user_agent", config.user_agent())?;

    if config.request_timeout() < Duration::from_secs(1) {
        return Err(GeoError::InvalidConfigValueError {
            field: "geocoder.timeout_seconds".to_string(),
            value: format!("{:?}", config.request_timeout()),
            reason: "Timeout must be at least one second".to_string(),
        });
    }

    let policy = config.retry_policy();
    validate_range("geocoder.max_attempts", policy.max_attempts, 1, 10)?;
    validate_range("geocoder.backoff_multiplier", policy.multiplier, 0.0, 60.0)?;
    if policy.min_wait > policy.max_wait {
        return Err(GeoError::ConfigValidationError {
            field: "geocoder.backoff_min_seconds".to_string(),
            message: format!(
                "minimum backoff {:?} exceeds maximum {:?}",
                policy.min_wait, policy.max_wait
            ),
        });
    }

    validate_positive_number("batch.concurrent_requests", config.concurrent_requests(), 1)?;

    validate_path("input.path", config.input_path())?;
    validate_extension("input.path", config.input_path(), &["csv"])?;
    validate_non_empty_string("input.postcode_column", config.postcode_column())?;
    validate_non_empty_string("input.country_column", config.country_column())?;

    validate_path("output.path", config.output_path())?;
    validate_file_name("output.filename", config.output_filename(), &["csv"])?;
    validate_file_name("output.report_filename", config.report_filename(), &["json"])?;

    if let Some(cache_path) = config.cache_path() {
        validate_path("cache.path", cache_path)?;
        validate_extension("cache.path", cache_path, &["json"])?;
    }

    Ok(())
}
