//! Error types for the booking_curve crate

use curve_math::MathError;
use thiserror::Error;

/// Custom error types for the booking_curve crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// A lead-time column label could not be read as an integer
    #[error("Invalid lead time label: {0:?}")]
    InvalidLeadTime(String),

    /// A required column is absent from an input table
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Not enough observations to compute a requested statistic
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error while reading configuration
    #[error("Config error: {0}")]
    ConfigError(#[from] serde_json::Error),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
