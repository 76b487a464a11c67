//! # Booking Curve
//!
//! Room-occupancy forecasting for hotels from booking curves.
//!
//! ## Features
//!
//! - Lead-time matrices (`LtMatrix`) with polars import/export
//! - Baseline curves: 3-month average, recent 90 days, recency weighted
//! - Pace adjusters: local 14-day pace, market pace, weekshape flow
//! - Monthly rounding reconciliation of daily forecasts to a month total
//! - Calendar segment adjustment and accuracy evaluation
//!
//! ## Lead times
//!
//! A lead time (LT) is the number of days before the stay date at which the
//! on-hand rooms were observed. `LT = -1` is the realized final value:
//!
//! ```rust
//! use booking_curve::ACTUAL_LT;
//!
//! assert_eq!(ACTUAL_LT, -1);
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use booking_curve::{apply_remainder_rounding, TargetMonth};
//! use chrono::NaiveDate;
//!
//! # fn main() -> booking_curve::Result<()> {
//! let month = TargetMonth::new(2025, 6)?;
//! let as_of = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//! let dates: Vec<NaiveDate> = (1..=4)
//!     .map(|d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap())
//!     .collect();
//!
//! // Whole rooms summing to the month goal, largest remainders first
//! let outcome = apply_remainder_rounding(&[10.2, 10.6, 10.1, 10.4], &dates, as_of, month, 42.0, None)?;
//! assert_eq!(outcome.values, vec![10.0, 11.0, 10.0, 11.0]);
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod calendar;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod frame;
pub mod market;
pub mod matrix;
pub mod output;
pub mod pace;
pub mod pickup;
pub mod pipeline;
pub mod rounding;
pub mod segment;
pub mod weekshape;

// Re-export commonly used types
pub use crate::baseline::{
    build_curve_from_final, moving_average_3months, moving_average_recent_90days,
    moving_average_recent_90days_weighted, BaselineCache, BaselineCurve,
};
pub use crate::calendar::{week_id, TargetMonth, WeekBoundary, WeekId, WeekdayMap};
pub use crate::config::{ForecastSettings, HotelConfig, HotelRegistry};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::{evaluate_forecast, ForecastMetrics};
pub use crate::frame::{ForecastFrame, ForecastRow, RowSource};
pub use crate::market::{compute_market_pace_7d, MarketPace};
pub use crate::matrix::{normalize_lt_columns, LtMatrix, ACTUAL_LT};
pub use crate::output::{ForecastTable, ForecastTableRow};
pub use crate::pace::{
    calc_pace14_pf, forecast_final_from_curve, forecast_final_from_pace14,
    forecast_final_from_pace14_market, forecast_final_from_pace14_weekshape_flow, ForecastScope,
};
pub use crate::pipeline::{build_monthly_forecast, ForecastRequest, ModelKind, MonthlyForecast};
pub use crate::rounding::{
    apply_remainder_rounding, round_total_goal, should_apply_monthly_rounding, RoundingOutcome,
    RoundingTermination,
};
pub use crate::segment::{apply_segment_adjustment, CalendarFeatures, DayFeatures, HolidayPosition};
pub use crate::weekshape::{
    compute_weekshape_flow_factors, train_weekshape_base_small_quantiles, WeekshapeFactor,
    WeekshapeFactors,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
