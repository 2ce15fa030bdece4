//! Management plan: static season setup plus the append-only irrigation schedule.
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A dated irrigation application, expressed as an offset from planting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrigationEvent {
    pub day_offset: u32,
    pub amount_mm: f64,
}

/// Immutable part of the plan, fixed for the whole episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSetup {
    pub planting_date: NaiveDate,
    pub field_id: String,
    pub crop: String,
    pub cultivar: String,
    pub soil_id: String,
    /// Number of days simulated after planting.
    pub window_days: u32,
}

impl SeasonSetup {
    /// Calendar date of a day offset.
    #[must_use]
    pub fn date_of(&self, day_offset: u32) -> NaiveDate {
        self.planting_date + Duration::days(i64::from(day_offset))
    }
}

/// Why an event could not be appended to the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRejection {
    /// The amount was zero, negative, or not finite.
    NonPositiveAmount,
    /// An event already exists for this day.
    DuplicateDay,
    /// The day precedes the latest scheduled event.
    OutOfOrder,
    /// The day lies beyond the simulation window.
    OutsideWindow,
}

/// Full set of agronomic inputs the simulator needs for one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementPlan {
    setup: SeasonSetup,
    events: Vec<IrrigationEvent>,
}

impl ManagementPlan {
    /// Start an empty plan for the given season.
    #[must_use]
    pub const fn new(setup: SeasonSetup) -> Self {
        Self {
            setup,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub const fn setup(&self) -> &SeasonSetup {
        &self.setup
    }

    /// Scheduled events in ascending day order.
    #[must_use]
    pub fn events(&self) -> &[IrrigationEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total scheduled water in millimetres.
    #[must_use]
    pub fn total_mm(&self) -> f64 {
        self.events.iter().map(|event| event.amount_mm).sum()
    }

    /// Append an event. Events only ever grow forward in time; nothing is edited in place.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanRejection`] when the amount is not positive, the day already has an
    /// event, the day precedes the latest event, or the day is outside the season window.
    pub fn append(&mut self, day_offset: u32, amount_mm: f64) -> Result<(), PlanRejection> {
        if !amount_mm.is_finite() || amount_mm <= 0.0 {
            return Err(PlanRejection::NonPositiveAmount);
        }
        if day_offset > self.setup.window_days {
            return Err(PlanRejection::OutsideWindow);
        }
        if let Some(last) = self.events.last() {
            if last.day_offset == day_offset {
                return Err(PlanRejection::DuplicateDay);
            }
            if last.day_offset > day_offset {
                return Err(PlanRejection::OutOfOrder);
            }
        }
        self.events.push(IrrigationEvent {
            day_offset,
            amount_mm,
        });
        Ok(())
    }
}
