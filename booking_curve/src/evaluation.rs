//! Metrics for evaluating forecast accuracy against realized rooms

use crate::error::{ForecastError, Result};
use crate::output::ForecastTable;
use statrs::statistics::Statistics;

/// Daily and monthly accuracy of a forecast table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastMetrics {
    /// Days with both a forecast and an actual
    pub n_days: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error over days with a non-zero actual
    pub mape: f64,
    /// Mean signed error (forecast - actual)
    pub bias: f64,
    /// Sample standard deviation of the signed errors
    pub error_std: f64,
    pub actual_total: f64,
    pub projected_total: f64,
    /// `projected_total - actual_total`
    pub total_error: f64,
    /// Total error as a percentage of the actual total, `NaN` when it is 0
    pub total_error_pct: f64,
}

/// Compare `forecast_rooms` with `actual_rooms` day by day, and the
/// projected month total with the actual total.
pub fn evaluate_forecast(table: &ForecastTable) -> Result<ForecastMetrics> {
    let pairs: Vec<(f64, f64)> = table
        .rows()
        .iter()
        .filter_map(|row| Some((row.forecast_rooms?, row.actual_rooms?)))
        .filter(|(f, a)| !f.is_nan() && !a.is_nan())
        .collect();

    if pairs.is_empty() {
        return Err(ForecastError::InsufficientData(
            "No day has both a forecast and an actual".to_string(),
        ));
    }

    let errors: Vec<f64> = pairs.iter().map(|(f, a)| f - a).collect();
    let mae = errors.iter().map(|e| e.abs()).mean();
    let rmse = errors.iter().map(|e| e * e).mean().sqrt();
    let bias = errors.iter().mean();
    let error_std = if errors.len() > 1 {
        errors.iter().std_dev()
    } else {
        0.0
    };

    let percentage: Vec<f64> = pairs
        .iter()
        .filter(|(_, a)| *a != 0.0)
        .map(|(f, a)| ((f - a) / a).abs() * 100.0)
        .collect();
    let mape = if percentage.is_empty() {
        f64::NAN
    } else {
        percentage.iter().mean()
    };

    let actual_total = table.actual_total();
    let projected_total = table.projected_total();
    let total_error = projected_total - actual_total;
    let total_error_pct = if actual_total == 0.0 {
        f64::NAN
    } else {
        total_error / actual_total * 100.0
    };

    Ok(ForecastMetrics {
        n_days: pairs.len(),
        mae,
        rmse,
        mape,
        bias,
        error_std,
        actual_total,
        projected_total,
        total_error,
        total_error_pct,
    })
}
