//! Pickup accumulation shared by the market pace and weekshape estimators

use crate::baseline::BaselineCurve;
use crate::matrix::RowView;

/// Observed and baseline-implied one-day pickup between `lt + 1` and `lt`.
///
/// `None` unless both on-hand cells and both curve points are present.
pub fn daily_pickup(row: &RowView<'_>, curve: &BaselineCurve, lt: i32) -> Option<(f64, f64)> {
    let current_oh = row.get(lt)?;
    let next_oh = row.get(lt + 1)?;
    let base_now = curve.get(lt)?;
    let base_next = curve.get(lt + 1)?;
    Some((current_oh - next_oh, base_now - base_next))
}

/// Running sums of actual and baseline pickup.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PickupTotals {
    pub sum_actual: f64,
    pub sum_base: f64,
    pub n_events: usize,
}

impl PickupTotals {
    pub fn add(&mut self, actual: f64, base: f64) {
        self.sum_actual += actual;
        self.sum_base += base;
        self.n_events += 1;
    }

    pub fn absorb(&mut self, other: &PickupTotals) {
        self.sum_actual += other.sum_actual;
        self.sum_base += other.sum_base;
        self.n_events += other.n_events;
    }
}
