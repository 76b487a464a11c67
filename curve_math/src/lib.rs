//! # Curve Math
//!
//! Numeric helpers shared by the booking curve engine.
//! Every helper treats `NaN` as "missing" the way the curve builders
//! expect, and reductions run sequentially in input order so results are
//! reproducible bit for bit.

use thiserror::Error;

pub mod averages;
pub mod quantile;
pub mod ratio;

pub use averages::{count_valid, nan_mean, weighted_mean};
pub use quantile::{quantile_linear, Quantiles};
pub use ratio::{safe_divide, ClipBand};

/// Errors that can occur in curve calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for curve math operations
pub type Result<T> = std::result::Result<T, MathError>;
