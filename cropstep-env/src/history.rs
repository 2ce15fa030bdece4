//! Fixed-capacity irrigation history and the aggregates derived from it.
use serde::{Deserialize, Serialize};

use crate::numbers::u32_to_f64;

/// Number of recorded amounts retained, most recent first.
pub const HISTORY_SLOTS: usize = 5;

/// Interval reported before two irrigations have been applied.
pub const NO_INTERVAL_DAYS: f64 = 30.0;

/// Ring of recently recorded amounts plus season aggregates.
///
/// The episode controller records one entry per accepted step (zero amounts included),
/// so the slots read as "today, one day ago, ..." lags. Aggregates only count positive
/// applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IrrigationHistory {
    amounts: [f64; HISTORY_SLOTS],
    cumulative_mm: f64,
    first_irrigation_day: Option<u32>,
    last_irrigation_day: Option<u32>,
    irrigation_count: u32,
}

impl IrrigationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an applied amount for `day`, dropping the oldest slot.
    pub fn record(&mut self, day: u32, amount_mm: f64) {
        let amount = if amount_mm.is_finite() {
            amount_mm.max(0.0)
        } else {
            0.0
        };
        self.amounts.rotate_right(1);
        self.amounts[0] = amount;
        self.cumulative_mm += amount;
        if amount > 0.0 {
            self.first_irrigation_day.get_or_insert(day);
            self.last_irrigation_day = Some(day);
            self.irrigation_count = self.irrigation_count.saturating_add(1);
        }
    }

    /// Slots ordered most-recent-first.
    #[must_use]
    pub const fn amounts(&self) -> &[f64; HISTORY_SLOTS] {
        &self.amounts
    }

    #[must_use]
    pub fn last_amount(&self) -> f64 {
        self.amounts[0]
    }

    /// Amount recorded `lag` entries ago (0 is the latest).
    #[must_use]
    pub fn lag(&self, lag: usize) -> f64 {
        self.amounts.get(lag).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub const fn cumulative_mm(&self) -> f64 {
        self.cumulative_mm
    }

    /// Days elapsed since the last positive application, or since day 0 if none yet.
    #[must_use]
    pub fn days_since_last_irrigation(&self, today: u32) -> f64 {
        let anchor = self.last_irrigation_day.unwrap_or(0);
        u32_to_f64(today.saturating_sub(anchor))
    }

    /// Mean spacing between consecutive positive applications.
    #[must_use]
    pub fn interval_avg(&self) -> f64 {
        match (self.first_irrigation_day, self.last_irrigation_day) {
            (Some(first), Some(last)) if self.irrigation_count >= 2 => {
                u32_to_f64(last - first) / f64::from(self.irrigation_count - 1)
            }
            _ => NO_INTERVAL_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_records_keep_five_most_recent() {
        let mut history = IrrigationHistory::new();
        for (day, amount) in [0, 3, 6, 9, 12, 15].into_iter().zip([10.0, 0.0, 20.0, 0.0, 30.0, 40.0]) {
            history.record(day, amount);
        }
        assert_eq!(history.amounts(), &[40.0, 30.0, 0.0, 20.0, 0.0]);
        assert!((history.cumulative_mm() - 100.0).abs() < f64::EPSILON);
        assert!((history.interval_avg() - 5.0).abs() < f64::EPSILON);
        assert!((history.days_since_last_irrigation(18) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_history_uses_defaults() {
        let history = IrrigationHistory::new();
        assert!((history.interval_avg() - NO_INTERVAL_DAYS).abs() < f64::EPSILON);
        assert!((history.days_since_last_irrigation(4) - 4.0).abs() < f64::EPSILON);
        assert!(history.last_amount().abs() < f64::EPSILON);
        assert!(history.lag(9).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_amounts_record_as_zero() {
        let mut history = IrrigationHistory::new();
        history.record(2, f64::NAN);
        history.record(3, -5.0);
        assert!(history.cumulative_mm().abs() < f64::EPSILON);
        assert_eq!(history.amounts(), &[0.0; HISTORY_SLOTS]);
        assert!((history.interval_avg() - NO_INTERVAL_DAYS).abs() < f64::EPSILON);
    }
}
