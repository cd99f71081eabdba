use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Geocoding provider error: {message}")]
    TransientProvider { message: String },

    #[error("Lookup for '{key}' failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        key: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Unsupported country: {country}")]
    UnsupportedCountry { country: String },

    #[error("Malformed {field} '{value}': {reason}")]
    MalformedInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Provider,
    Input,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeoError {
    pub fn transient(message: impl Into<String>) -> Self {
        GeoError::TransientProvider {
            message: message.into(),
        }
    }

    pub fn malformed(field: &str, value: &str, reason: impl Into<String>) -> Self {
        GeoError::MalformedInput {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors the retrier is allowed to try again. Everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeoError::TransientProvider { .. } | GeoError::HttpError(_)
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GeoError::ConfigError { .. }
            | GeoError::MissingConfigError { .. }
            | GeoError::InvalidConfigValueError { .. }
            | GeoError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            GeoError::HttpError(_)
            | GeoError::TransientProvider { .. }
            | GeoError::RetryExhausted { .. } => ErrorCategory::Provider,
            GeoError::UnsupportedCountry { .. } | GeoError::MalformedInput { .. } => {
                ErrorCategory::Input
            }
            GeoError::IoError(_) | GeoError::ZipError(_) => ErrorCategory::Storage,
            GeoError::CsvError(_)
            | GeoError::SerializationError(_)
            | GeoError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Provider => ErrorSeverity::Medium,
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command-line flags or the TOML configuration file"
            }
            ErrorCategory::Provider => {
                "The geocoding service may be rate limiting; lower the request rate and rerun"
            }
            ErrorCategory::Input => "Check the postcode and country columns of the input dataset",
            ErrorCategory::Storage => {
                "Make sure the input file exists and the output directory is writable"
            }
            ErrorCategory::Processing => "Make sure the input file is a well-formed CSV with a header row",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Provider => format!("Geocoding service unavailable: {}", self),
            ErrorCategory::Input => format!("Bad input row: {}", self),
            ErrorCategory::Storage => format!("Could not read or write files: {}", self),
            ErrorCategory::Processing => format!("Could not process the dataset: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_failures_are_transient() {
        assert!(GeoError::transient("HTTP 503").is_transient());
        assert!(!GeoError::malformed("postcode", "abc", "not numeric").is_transient());
        assert!(!GeoError::RetryExhausted {
            key: "90210, US".to_string(),
            attempts: 3,
            last_error: "timeout".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_severity_follows_category() {
        let err = GeoError::MissingConfigError {
            field: "input.path".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = GeoError::UnsupportedCountry {
            country: "Canada".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.user_friendly_message().contains("Canada"));
    }
}
