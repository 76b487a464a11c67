//! Forecast tunables and hotel configuration
//!
//! Every constant the engine relies on lives in [`ForecastSettings`]. The
//! defaults reproduce the historical forecasts; callers deserialize
//! overrides from JSON with missing fields falling back to the defaults.

use crate::calendar::WeekBoundary;
use crate::error::{ForecastError, Result};
use curve_math::ClipBand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Recency weights for the weighted 90-day curve.
///
/// Ages are measured in days between the stay date and the as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyWeights {
    /// Weight for ages 0..=14 days
    pub recent: f64,
    /// Weight for ages 15..=30 days
    pub mid: f64,
    /// Weight for ages 31..=90 days
    pub old: f64,
}

impl Default for RecencyWeights {
    fn default() -> Self {
        Self {
            recent: 3.0,
            mid: 2.0,
            old: 1.0,
        }
    }
}

impl RecencyWeights {
    /// Weight of an observation `age_days` away from the as-of date.
    pub fn weight(&self, age_days: i64) -> f64 {
        match age_days.abs() {
            0..=14 => self.recent,
            15..=30 => self.mid,
            31..=90 => self.old,
            _ => 0.0,
        }
    }
}

/// Local 14-day pace settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pace14Settings {
    pub lower_lt_min: i32,
    pub upper_lt: i32,
    pub clip: ClipBand,
    pub clip_spike: ClipBand,
    pub spike_q_lo: f64,
    pub spike_q_hi: f64,
    pub spike_min_n: usize,
    pub epsilon: f64,
}

impl Default for Pace14Settings {
    fn default() -> Self {
        Self {
            lower_lt_min: 7,
            upper_lt: 14,
            clip: ClipBand {
                low: 0.70,
                high: 1.30,
            },
            clip_spike: ClipBand {
                low: 0.85,
                high: 1.15,
            },
            spike_q_lo: 0.01,
            spike_q_hi: 0.995,
            spike_min_n: 20,
            epsilon: 1e-6,
        }
    }
}

/// Market pace settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketPaceSettings {
    /// First lead time where the market factor is applied
    pub lt_min: i32,
    /// Last lead time where the market factor is applied
    pub lt_max: i32,
    pub clip: ClipBand,
    pub decay_k: f64,
    /// Number of trailing candidate as-of dates
    pub days: u32,
    pub min_events_7d: usize,
    pub min_abs_sum_base: f64,
}

impl Default for MarketPaceSettings {
    fn default() -> Self {
        Self {
            lt_min: 15,
            lt_max: 30,
            clip: ClipBand {
                low: 0.95,
                high: 1.05,
            },
            decay_k: 0.2,
            days: 7,
            min_events_7d: 20,
            min_abs_sum_base: 1.0,
        }
    }
}

/// Weekshape flow settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekshapeSettings {
    pub lt_min: i32,
    pub lt_max: i32,
    /// Width of the trailing pickup window, in days
    pub w: i32,
    pub min_events: usize,
    pub min_sum_base: f64,
    /// Pooled base pickups at or below this magnitude are treated as zero
    pub epsilon: f64,
    pub clip: ClipBand,
    pub boundary: WeekBoundary,
}

impl Default for WeekshapeSettings {
    fn default() -> Self {
        Self {
            lt_min: 15,
            lt_max: 45,
            w: 7,
            min_events: 3,
            min_sum_base: 1.0,
            epsilon: 1e-6,
            clip: ClipBand {
                low: 0.85,
                high: 1.15,
            },
            boundary: WeekBoundary::Iso,
        }
    }
}

/// Monthly rounding settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingSettings {
    pub min_future_days: usize,
    pub unit: f64,
}

impl Default for RoundingSettings {
    fn default() -> Self {
        Self {
            min_future_days: 20,
            unit: 1.0,
        }
    }
}

/// Calendar segment adjustment settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentSettings {
    pub long_holiday_min_len: u32,
    pub middle_factor: f64,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            long_holiday_min_len: 3,
            middle_factor: 0.98,
        }
    }
}

/// All forecast tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub lt_min: i32,
    pub lt_max: i32,
    pub recent90_min_count_weekday: usize,
    pub recent90_weights: RecencyWeights,
    pub pace14: Pace14Settings,
    pub market: MarketPaceSettings,
    pub weekshape: WeekshapeSettings,
    pub rounding: RoundingSettings,
    pub segment: SegmentSettings,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            lt_min: -1,
            lt_max: 90,
            recent90_min_count_weekday: 6,
            recent90_weights: RecencyWeights::default(),
            pace14: Pace14Settings::default(),
            market: MarketPaceSettings::default(),
            weekshape: WeekshapeSettings::default(),
            rounding: RoundingSettings::default(),
            segment: SegmentSettings::default(),
        }
    }
}

impl ForecastSettings {
    /// Parse settings from JSON, filling absent fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject inverted ranges and bands.
    pub fn validate(&self) -> Result<()> {
        check_range("lt", self.lt_min, self.lt_max)?;
        check_range(
            "pace14",
            self.pace14.lower_lt_min,
            self.pace14.upper_lt,
        )?;
        check_range("market", self.market.lt_min, self.market.lt_max)?;
        check_range("weekshape", self.weekshape.lt_min, self.weekshape.lt_max)?;

        self.pace14.clip.validate()?;
        self.pace14.clip_spike.validate()?;
        self.market.clip.validate()?;
        self.weekshape.clip.validate()?;

        if self.pace14.spike_q_lo > self.pace14.spike_q_hi {
            return Err(ForecastError::InvalidParameter(
                "pace14 spike_q_lo must not exceed spike_q_hi".to_string(),
            ));
        }
        if self.weekshape.w <= 0 {
            return Err(ForecastError::InvalidParameter(
                "weekshape window must be positive".to_string(),
            ));
        }
        if self.market.days == 0 {
            return Err(ForecastError::InvalidParameter(
                "market pace needs at least one candidate day".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, min: i32, max: i32) -> Result<()> {
    if min > max {
        return Err(ForecastError::InvalidParameter(format!(
            "{}_min ({}) must be less than or equal to {}_max ({})",
            name, min, name, max
        )));
    }
    Ok(())
}

/// Per-hotel settings supplied by the hotel registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelConfig {
    #[serde(default)]
    pub display_name: String,
    pub capacity: f64,
    #[serde(default)]
    pub data_subdir: Option<String>,
    #[serde(default)]
    pub timeseries_file: Option<String>,
}

impl HotelConfig {
    pub fn new(display_name: &str, capacity: f64) -> Result<Self> {
        let config = Self {
            display_name: display_name.to_string(),
            capacity,
            data_subdir: None,
            timeseries_file: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Capacity must be a finite positive room count.
    pub fn validate(&self) -> Result<()> {
        if !self.capacity.is_finite() || self.capacity <= 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Hotel capacity must be > 0, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

/// Hotel configurations keyed by hotel tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotelRegistry {
    hotels: BTreeMap<String, HotelConfig>,
}

impl HotelRegistry {
    /// Parse a registry such as
    /// `{"daikokucho": {"display_name": "...", "capacity": 171}}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(json)?;
        for (tag, hotel) in &registry.hotels {
            hotel.validate().map_err(|e| {
                ForecastError::InvalidParameter(format!("hotel {}: {}", tag, e))
            })?;
        }
        Ok(registry)
    }

    /// Load a registry file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, hotel_tag: &str) -> Option<&HotelConfig> {
        self.hotels.get(hotel_tag)
    }

    /// Capacity of `hotel_tag`, if configured.
    pub fn capacity(&self, hotel_tag: &str) -> Option<f64> {
        self.get(hotel_tag).map(|hotel| hotel.capacity)
    }

    pub fn insert(&mut self, hotel_tag: &str, config: HotelConfig) {
        self.hotels.insert(hotel_tag.to_string(), config);
    }

    /// Hotel tags in sorted order.
    pub fn tags(&self) -> Vec<&str> {
        self.hotels.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.hotels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotels.is_empty()
    }
}
