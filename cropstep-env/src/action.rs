//! Action processing: clip, threshold, and constraint-check raw irrigation requests.
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plan::IrrigationEvent;

/// Operational limits applied to every raw action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLimits {
    #[serde(default = "ActionLimits::default_max_amount_mm")]
    pub max_amount_mm: f64,
    #[serde(default = "ActionLimits::default_min_amount_mm")]
    pub min_amount_mm: f64,
    #[serde(default = "ActionLimits::default_window_days")]
    pub window_days: u32,
    #[serde(default = "ActionLimits::default_max_events_per_window")]
    pub max_events_per_window: usize,
    #[serde(default = "ActionLimits::default_min_spacing_days")]
    pub min_spacing_days: u32,
}

impl ActionLimits {
    const fn default_max_amount_mm() -> f64 {
        50.0
    }

    const fn default_min_amount_mm() -> f64 {
        5.0
    }

    const fn default_window_days() -> u32 {
        7
    }

    const fn default_max_events_per_window() -> usize {
        3
    }

    const fn default_min_spacing_days() -> u32 {
        2
    }

    /// Check that the limits describe a usable action range.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the amount bounds are inverted or negative, or the
    /// trailing window is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_amount_mm >= 0.0) {
            return Err(ConfigError::MinViolation {
                field: "action.min_amount_mm",
                min: 0.0,
                value: self.min_amount_mm,
            });
        }
        if !(self.max_amount_mm >= self.min_amount_mm) {
            return Err(ConfigError::InvertedRange {
                field: "action.amount_mm",
                min: self.min_amount_mm,
                max: self.max_amount_mm,
            });
        }
        if self.window_days == 0 {
            return Err(ConfigError::MinViolation {
                field: "action.window_days",
                min: 1.0,
                value: 0.0,
            });
        }
        Ok(())
    }
}

impl Default for ActionLimits {
    fn default() -> Self {
        Self {
            max_amount_mm: Self::default_max_amount_mm(),
            min_amount_mm: Self::default_min_amount_mm(),
            window_days: Self::default_window_days(),
            max_events_per_window: Self::default_max_events_per_window(),
            min_spacing_days: Self::default_min_spacing_days(),
        }
    }
}

/// Operational rule that forced an action to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConstraintViolation {
    /// The trailing window already holds the maximum number of events.
    WeeklyLimit {
        window_days: u32,
        events_in_window: usize,
        max_events: usize,
    },
    /// The previous event is too recent.
    MinSpacing { days_since_last: u32, min_days: u32 },
}

impl ConstraintViolation {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WeeklyLimit { .. } => "weekly_limit",
            Self::MinSpacing { .. } => "min_spacing",
        }
    }
}

/// Result of processing one raw action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub raw_mm: f64,
    pub clipped_mm: f64,
    pub accepted_mm: f64,
    pub below_threshold: bool,
    pub violation: Option<ConstraintViolation>,
}

impl ActionDecision {
    #[must_use]
    pub fn is_irrigation(&self) -> bool {
        self.accepted_mm > 0.0
    }
}

/// Pure action validator; holds only its limits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionProcessor {
    limits: ActionLimits,
}

impl ActionProcessor {
    #[must_use]
    pub const fn new(limits: ActionLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &ActionLimits {
        &self.limits
    }

    /// Resolve `raw_mm` requested on `day_index` against the already scheduled `events`.
    ///
    /// The result is always `0` or lies in `[min_amount_mm, max_amount_mm]`.
    #[must_use]
    pub fn process(&self, raw_mm: f64, day_index: u32, events: &[IrrigationEvent]) -> ActionDecision {
        let clipped_mm = if raw_mm.is_nan() {
            0.0
        } else {
            raw_mm.clamp(0.0, self.limits.max_amount_mm)
        };
        let below_threshold = clipped_mm < self.limits.min_amount_mm;
        let mut decision = ActionDecision {
            raw_mm,
            clipped_mm,
            accepted_mm: 0.0,
            below_threshold,
            violation: None,
        };
        if below_threshold || clipped_mm <= 0.0 {
            return decision;
        }
        if let Some(violation) = self.check_constraints(day_index, events) {
            decision.violation = Some(violation);
            return decision;
        }
        decision.accepted_mm = clipped_mm;
        decision
    }

    fn check_constraints(&self, day_index: u32, events: &[IrrigationEvent]) -> Option<ConstraintViolation> {
        let window_start = day_index.saturating_sub(self.limits.window_days.saturating_sub(1));
        let events_in_window = events
            .iter()
            .filter(|event| (window_start..=day_index).contains(&event.day_offset))
            .count();
        if events_in_window >= self.limits.max_events_per_window {
            return Some(ConstraintViolation::WeeklyLimit {
                window_days: self.limits.window_days,
                events_in_window,
                max_events: self.limits.max_events_per_window,
            });
        }

        let last_prior = events
            .iter()
            .filter(|event| event.day_offset <= day_index)
            .map(|event| event.day_offset)
            .max();
        if let Some(last_day) = last_prior {
            let days_since_last = day_index - last_day;
            if days_since_last < self.limits.min_spacing_days {
                return Some(ConstraintViolation::MinSpacing {
                    days_since_last,
                    min_days: self.limits.min_spacing_days,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(days: &[u32]) -> Vec<IrrigationEvent> {
        days.iter()
            .map(|&day_offset| IrrigationEvent {
                day_offset,
                amount_mm: 20.0,
            })
            .collect()
    }

    #[test]
    fn clips_and_thresholds() {
        let processor = ActionProcessor::default();
        assert!((processor.process(80.0, 0, &[]).accepted_mm - 50.0).abs() < f64::EPSILON);
        assert!(processor.process(4.99, 0, &[]).accepted_mm.abs() < f64::EPSILON);
        assert!(processor.process(-12.0, 0, &[]).accepted_mm.abs() < f64::EPSILON);
        assert!(processor.process(f64::NAN, 0, &[]).accepted_mm.abs() < f64::EPSILON);
        assert!((processor.process(f64::INFINITY, 0, &[]).accepted_mm - 50.0).abs() < f64::EPSILON);
        let decision = processor.process(5.0, 0, &[]);
        assert!((decision.accepted_mm - 5.0).abs() < f64::EPSILON);
        assert!(!decision.below_threshold);
    }

    #[test]
    fn accepted_amount_is_zero_or_within_range() {
        let processor = ActionProcessor::default();
        let mut raw = -20.0;
        while raw < 120.0 {
            let amount = processor.process(raw, 10, &[]).accepted_mm;
            assert!(amount == 0.0 || (5.0..=50.0).contains(&amount), "raw {raw} -> {amount}");
            if raw < 5.0 {
                assert!(amount.abs() < f64::EPSILON);
            }
            raw += 0.25;
        }
    }

    #[test]
    fn weekly_limit_rejects_fourth_event() {
        let processor = ActionProcessor::default();
        let decision = processor.process(30.0, 12, &events(&[6, 8, 10]));
        assert!(decision.accepted_mm.abs() < f64::EPSILON);
        assert!(matches!(
            decision.violation,
            Some(ConstraintViolation::WeeklyLimit {
                events_in_window: 3,
                ..
            })
        ));
        // Day 5 has dropped out of the trailing week ending on day 12.
        let decision = processor.process(30.0, 12, &events(&[5, 8, 10]));
        assert!((decision.accepted_mm - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spacing_rejects_back_to_back_days() {
        let processor = ActionProcessor::default();
        let decision = processor.process(30.0, 4, &events(&[3]));
        assert_eq!(
            decision.violation,
            Some(ConstraintViolation::MinSpacing {
                days_since_last: 1,
                min_days: 2
            })
        );
        let same_day = processor.process(30.0, 3, &events(&[3]));
        assert_eq!(same_day.violation.map(ConstraintViolation::label), Some("min_spacing"));
        assert!(processor.process(30.0, 5, &events(&[3])).is_irrigation());
    }

    #[test]
    fn small_actions_skip_constraint_checks() {
        let processor = ActionProcessor::default();
        let decision = processor.process(2.0, 4, &events(&[3]));
        assert!(decision.below_threshold);
        assert!(decision.violation.is_none());
    }

    #[test]
    fn limits_validation_catches_inverted_range() {
        let limits = ActionLimits {
            max_amount_mm: 3.0,
            ..ActionLimits::default()
        };
        assert!(matches!(limits.validate(), Err(ConfigError::InvertedRange { .. })));
        assert!(ActionLimits::default().validate().is_ok());
    }
}
