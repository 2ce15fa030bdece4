use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::DataAcquisitionError;
use crate::numbers::usize_to_f64;

/// One day of driving weather.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    /// MJ/m²/d
    pub srad: f64,
    pub tmax: f64,
    pub tmin: f64,
    /// mm
    pub rain: f64,
}

impl WeatherDay {
    #[must_use]
    pub fn tavg(&self) -> f64 {
        f64::midpoint(self.tmin, self.tmax)
    }
}

/// Daily weather for a station, consecutive dates in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSeries {
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: f64,
    pub days: Vec<WeatherDay>,
}

impl WeatherSeries {
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.first().map(|day| day.date)
    }

    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|day| day.date)
    }

    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<&WeatherDay> {
        let first = self.first_date()?;
        let offset = usize::try_from((date - first).num_days()).ok()?;
        self.days.get(offset).filter(|day| day.date == date)
    }

    /// `count` consecutive days starting at `date`, if all are present.
    #[must_use]
    pub fn window(&self, date: NaiveDate, count: usize) -> Option<&[WeatherDay]> {
        let first = self.first_date()?;
        let start = usize::try_from((date - first).num_days()).ok()?;
        self.days.get(start..start.checked_add(count)?)
    }

    /// Whether every date in `[first, last]` is available.
    #[must_use]
    pub fn covers(&self, first: NaiveDate, last: NaiveDate) -> bool {
        match (self.first_date(), self.last_date()) {
            (Some(start), Some(end)) => start <= first && end >= last,
            _ => false,
        }
    }

    /// Long-term mean temperature.
    #[must_use]
    pub fn tav(&self) -> f64 {
        if self.days.is_empty() {
            return 0.0;
        }
        self.days.iter().map(WeatherDay::tavg).sum::<f64>() / usize_to_f64(self.days.len())
    }

    /// Check date continuity and value plausibility.
    ///
    /// # Errors
    ///
    /// Returns [`DataAcquisitionError::Other`] describing the first gap or bad value.
    pub fn validate(&self) -> Result<(), DataAcquisitionError> {
        for pair in self.days.windows(2) {
            if pair[1].date != pair[0].date + Duration::days(1) {
                return Err(DataAcquisitionError::Other(format!(
                    "weather for {} jumps from {} to {}",
                    self.station, pair[0].date, pair[1].date
                )));
            }
        }
        if let Some(day) = self
            .days
            .iter()
            .find(|day| !(day.tmin <= day.tmax && day.rain >= 0.0 && day.srad >= 0.0))
        {
            return Err(DataAcquisitionError::Other(format!(
                "weather for {} has implausible values on {}",
                self.station, day.date
            )));
        }
        Ok(())
    }

    /// Keep only `[first, last]`.
    #[must_use]
    pub fn clipped(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        self.days.retain(|day| day.date >= first && day.date <= last);
        self
    }
}
