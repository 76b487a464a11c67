//! Sample quantiles
//!
//! Quantiles use linear interpolation between closest ranks
//! (`h = (n - 1) * q`), the default of most dataframe libraries, so that
//! thresholds learned here line up with the ones analysts compute by hand.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Linear-interpolated quantile of the non-`NaN` values in `values`.
pub fn quantile_linear(values: &[f64], q: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must be within [0, 1], got {}",
            q
        )));
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Err(MathError::InsufficientData(
            "No valid observations for quantile".to_string(),
        ));
    }
    sorted.sort_by(f64::total_cmp);

    let h = (sorted.len() - 1) as f64 * q;
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;
    let fraction = h - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// The conservative upper quantiles used as fallback caps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    pub p90: f64,
    pub p95: f64,
    pub p975: f64,
}

impl Quantiles {
    /// Compute p90 / p95 / p97.5 of the given sample.
    pub fn upper_tail(values: &[f64]) -> Result<Self> {
        Ok(Self {
            p90: quantile_linear(values, 0.90)?,
            p95: quantile_linear(values, 0.95)?,
            p975: quantile_linear(values, 0.975)?,
        })
    }

    /// Candidates ordered from least to most conservative.
    pub fn candidates(&self) -> [f64; 3] {
        [self.p90, self.p95, self.p975]
    }
}
