//! Error types for the trapcast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the trapcast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// A site's tables could not be retrieved
    #[error("Error retrieving data for {0}")]
    Retrieval(String),

    /// Invalid combination of forecaster settings, raised before any fit
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error related to forecasting operations
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error reported by the Prophet model
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from HTTP retrieval
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Error parsing the configuration file
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(err: reqwest::Error) -> Self {
        ForecastError::HttpError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigParse(err.to_string())
    }
}

impl From<augurs::prophet::Error> for ForecastError {
    fn from(err: augurs::prophet::Error) -> Self {
        ForecastError::ModelError(err.to_string())
    }
}
