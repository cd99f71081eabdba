use crate::adapters::nominatim::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};
use crate::config::{
    validate_settings, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS,
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CONCURRENT_REQUESTS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MIN_INTERVAL_MS, DEFAULT_OUTPUT_FILENAME, DEFAULT_OUTPUT_PATH,
    DEFAULT_REPORT_FILENAME, DEFAULT_TIMEOUT_SECS,
};
use crate::core::batch::{DEFAULT_COUNTRY_COLUMN, DEFAULT_POSTCODE_COLUMN};
use crate::core::retry::RetryPolicy;
use crate::core::ConfigProvider;
use crate::utils::error::{GeoError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub geocoder: Option<GeocoderConfig>,
    pub output: Option<OutputConfig>,
    pub batch: Option<BatchConfig>,
    pub cache: Option<CacheConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: String,
    pub postcode_column: Option<String>,
    pub country_column: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub endpoint: Option<String>,
    pub user_agent: Option<String>,
    pub min_interval_ms: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff_multiplier: Option<f64>,
    pub backoff_min_seconds: Option<u64>,
    pub backoff_max_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub filename: Option<String>,
    pub report_filename: Option<String>,
    pub compress: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub file: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// Loads and parses a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text after expanding `${VAR}` references from the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeoError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as written so the parse error names them.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GeoError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    fn geocoder(&self) -> GeocoderConfig {
        self.geocoder.clone().unwrap_or_default()
    }

    fn output(&self) -> Option<&OutputConfig> {
        self.output.as_ref()
    }

    pub fn verbose(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.verbose).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn log_file(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.file.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn provider_endpoint(&self) -> &str {
        self.geocoder
            .as_ref()
            .and_then(|g| g.endpoint.as_deref())
            .unwrap_or(DEFAULT_ENDPOINT)
    }

    fn user_agent(&self) -> &str {
        self.geocoder
            .as_ref()
            .and_then(|g| g.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(self.geocoder().min_interval_ms.unwrap_or(DEFAULT_MIN_INTERVAL_MS))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder().timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    fn retry_policy(&self) -> RetryPolicy {
        let geocoder = self.geocoder();
        RetryPolicy {
            max_attempts: geocoder.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            multiplier: geocoder
                .backoff_multiplier
                .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER),
            min_wait: Duration::from_secs(
                geocoder.backoff_min_seconds.unwrap_or(DEFAULT_BACKOFF_MIN_SECS),
            ),
            max_wait: Duration::from_secs(
                geocoder.backoff_max_seconds.unwrap_or(DEFAULT_BACKOFF_MAX_SECS),
            ),
        }
    }

    fn concurrent_requests(&self) -> usize {
        self.batch
            .as_ref()
            .and_then(|b| b.concurrent_requests)
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    fn input_path(&self) -> &str {
        &self.input.path
    }

    fn postcode_column(&self) -> &str {
        self.input
            .postcode_column
            .as_deref()
            .unwrap_or(DEFAULT_POSTCODE_COLUMN)
    }

    fn country_column(&self) -> &str {
        self.input
            .country_column
            .as_deref()
            .unwrap_or(DEFAULT_COUNTRY_COLUMN)
    }

    fn output_path(&self) -> &str {
        self.output()
            .and_then(|o| o.path.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    fn output_filename(&self) -> &str {
        self.output()
            .and_then(|o| o.filename.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_FILENAME)
    }

    fn report_filename(&self) -> &str {
        self.output()
            .and_then(|o| o.report_filename.as_deref())
            .unwrap_or(DEFAULT_REPORT_FILENAME)
    }

    fn compress_output(&self) -> bool {
        self.output().and_then(|o| o.compress).unwrap_or(false)
    }

    fn cache_path(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.path.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_settings(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
[input]
path = "original_dataset.csv"
"#,
        )
        .unwrap();

        assert_eq!(config.provider_endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.postcode_column(), "postcode");
        assert_eq!(config.country_column(), "country");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.min_interval(), Duration::from_millis(50));
        assert_eq!(config.output_filename(), "geocoded_dataset.csv");
        assert!(!config.compress_output());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let config = TomlConfig::from_toml_str(
            r#"
[input]
path = "data/listings.csv"
postcode_column = "zip"
country_column = "nation"

[geocoder]
endpoint = "http://localhost:8080"
user_agent = "listings-enricher"
min_interval_ms = 1000
timeout_seconds = 5
max_attempts = 5
backoff_multiplier = 2.0
backoff_min_seconds = 1
backoff_max_seconds = 30

[output]
path = "./out"
compress = true

[batch]
concurrent_requests = 8

[cache]
path = "geocode_cache.json"

[logging]
verbose = true
file = "geocoding.log"
"#,
        )
        .unwrap();

        assert_eq!(config.postcode_column(), "zip");
        assert_eq!(config.min_interval(), Duration::from_secs(1));
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.retry_policy().max_wait, Duration::from_secs(30));
        assert_eq!(config.concurrent_requests(), 8);
        assert_eq!(config.cache_path(), Some("geocode_cache.json"));
        assert!(config.compress_output());
        assert!(config.verbose());
        assert_eq!(config.log_file(), Some("geocoding.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GEOCODER_TEST_ENDPOINT", "https://geocode.internal");

        let config = TomlConfig::from_toml_str(
            r#"
[input]
path = "original_dataset.csv"

[geocoder]
endpoint = "${GEOCODER_TEST_ENDPOINT}"
"#,
        )
        .unwrap();
        assert_eq!(config.provider_endpoint(), "https://geocode.internal");

        std::env::remove_var("GEOCODER_TEST_ENDPOINT");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str(
            r#"
[input]
path = "listings.xlsx"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str(
            r#"
[input]
path = "listings.csv"

[geocoder]
endpoint = "not a url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_input_section_fails_to_parse() {
        let err = TomlConfig::from_toml_str("[geocoder]\nmax_attempts = 3\n").unwrap_err();
        assert!(matches!(err, GeoError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[input]\npath = \"from_file.csv\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.input_path(), "from_file.csv");
    }
}
