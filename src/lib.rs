//! # Occupancy Forecast
//!
//! Workspace facade over the booking curve engine and its numeric helpers.
//!
//! ## Example
//!
//! ```
//! use occupancy_forecast_workspace::booking_curve::{ModelKind, TargetMonth};
//!
//! let model: ModelKind = "pace14_market".parse().unwrap();
//! assert_eq!(model, ModelKind::Pace14Market);
//!
//! let month: TargetMonth = "202506".parse().unwrap();
//! assert_eq!(month.offset(-3).to_string(), "202503");
//! ```

pub use booking_curve;
pub use curve_math;
