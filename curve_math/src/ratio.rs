//! Guarded ratios and clipping bands

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Divide `numerator` by `denominator`, yielding `NaN` when either side is
/// missing or `|denominator| <= epsilon`.
pub fn safe_divide(numerator: f64, denominator: f64, epsilon: f64) -> f64 {
    if numerator.is_nan() || denominator.is_nan() {
        return f64::NAN;
    }
    if denominator.abs() <= epsilon {
        return f64::NAN;
    }
    numerator / denominator
}

/// Inclusive `[low, high]` band used to bound multiplicative factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipBand {
    pub low: f64,
    pub high: f64,
}

impl ClipBand {
    /// Create a new band, rejecting inverted or non-finite bounds.
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let band = Self { low, high };
        band.validate()?;
        Ok(band)
    }

    /// Check the band is finite and ordered.
    pub fn validate(&self) -> Result<()> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Clip bounds must be finite, got ({}, {})",
                self.low, self.high
            )));
        }
        if self.low > self.high {
            return Err(MathError::InvalidInput(format!(
                "Clip lower bound {} exceeds upper bound {}",
                self.low, self.high
            )));
        }
        Ok(())
    }

    /// Clip `value` into the band. `NaN` stays `NaN`.
    pub fn clip(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        value.max(self.low).min(self.high)
    }

    /// Whether `value` lies inside the band.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}
