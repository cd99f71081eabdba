use crate::adapters::nominatim::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};
use crate::config::{
    validate_settings, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS,
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CONCURRENT_REQUESTS, DEFAULT_INPUT_PATH,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_INTERVAL_MS, DEFAULT_OUTPUT_FILENAME, DEFAULT_OUTPUT_PATH,
    DEFAULT_REPORT_FILENAME, DEFAULT_TIMEOUT_SECS,
};
use crate::core::retry::RetryPolicy;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "postcode-geocoder")]
#[command(about = "Adds latitude/longitude to a listings CSV from its postcode and country columns")]
pub struct CliConfig {
    #[arg(long, default_value = DEFAULT_INPUT_PATH)]
    pub input_path: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output_path: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_FILENAME)]
    pub output_filename: String,

    #[arg(long, default_value = DEFAULT_REPORT_FILENAME)]
    pub report_filename: String,

    #[arg(long, help = "Bundle the dataset and report into one zip archive")]
    pub compress: bool,

    #[arg(long, default_value = "postcode")]
    pub postcode_column: String,

    #[arg(long, default_value = "country")]
    pub country_column: String,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, default_value_t = DEFAULT_MIN_INTERVAL_MS)]
    pub min_interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_BACKOFF_MULTIPLIER)]
    pub backoff_multiplier: f64,

    #[arg(long, default_value_t = DEFAULT_BACKOFF_MIN_SECS)]
    pub backoff_min_secs: u64,

    #[arg(long, default_value_t = DEFAULT_BACKOFF_MAX_SECS)]
    pub backoff_max_secs: u64,

    #[arg(long, default_value_t = DEFAULT_CONCURRENT_REQUESTS)]
    pub concurrent_requests: usize,

    #[arg(long, help = "JSON file used to persist geocoded postcodes between runs")]
    pub cache_path: Option<String>,

    #[arg(long, help = "Also append logs to this file")]
    pub log_file: Option<String>,

    #[arg(long, help = "Emit JSON log lines instead of console output")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn provider_endpoint(&self) -> &str {
        &self.endpoint
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            multiplier: self.backoff_multiplier,
            min_wait: Duration::from_secs(self.backoff_min_secs),
            max_wait: Duration::from_secs(self.backoff_max_secs),
        }
    }

    fn concurrent_requests(&self) -> usize {
        self.concurrent_requests
    }

    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn postcode_column(&self) -> &str {
        &self.postcode_column
    }

    fn country_column(&self) -> &str {
        &self.country_column
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_filename(&self) -> &str {
        &self.output_filename
    }

    fn report_filename(&self) -> &str {
        &self.report_filename
    }

    fn compress_output(&self) -> bool {
        self.compress
    }

    fn cache_path(&self) -> Option<&str> {
        self.cache_path.as_deref()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_settings(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_provider_limits() {
        let config = CliConfig::parse_from(["postcode-geocoder"]);

        assert_eq!(config.input_path(), "original_dataset.csv");
        assert_eq!(config.output_filename(), "geocoded_dataset.csv");
        assert_eq!(config.min_interval(), Duration::from_millis(50));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.concurrent_requests(), 1);
        assert_eq!(config.cache_path(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = CliConfig::parse_from([
            "postcode-geocoder",
            "--input-path",
            "data/listings.csv",
            "--concurrent-requests",
            "4",
            "--cache-path",
            "cache.json",
            "--compress",
        ]);

        assert_eq!(config.input_path(), "data/listings.csv");
        assert_eq!(config.concurrent_requests(), 4);
        assert_eq!(config.cache_path(), Some("cache.json"));
        assert!(config.compress_output());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_backoff_is_rejected() {
        let config = CliConfig::parse_from([
            "postcode-geocoder",
            "--backoff-min-secs",
            "20",
            "--backoff-max-secs",
            "10",
        ]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["postcode-geocoder", "--concurrent-requests", "0"]);
        assert!(config.validate().is_err());
    }
}
