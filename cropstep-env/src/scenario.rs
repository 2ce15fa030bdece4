//! Randomized scenarios: location and planting date drawn per episode.
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::config::{EpisodeConfig, Location};
use crate::error::ConfigError;
use crate::seed::{SCENARIO_STREAM, stream_rng};

/// Inclusive bounds for randomized scenario parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRanges {
    #[serde(default = "ScenarioRanges::default_latitude")]
    pub latitude: (f64, f64),
    #[serde(default = "ScenarioRanges::default_longitude")]
    pub longitude: (f64, f64),
    #[serde(default = "ScenarioRanges::default_year")]
    pub year: (i32, i32),
    #[serde(default = "ScenarioRanges::default_planting_day")]
    pub planting_day: (u32, u32),
}

impl ScenarioRanges {
    const fn default_latitude() -> (f64, f64) {
        (10.0, 15.0)
    }

    const fn default_longitude() -> (f64, f64) {
        (75.0, 80.0)
    }

    const fn default_year() -> (i32, i32) {
        (2010, 2020)
    }

    const fn default_planting_day() -> (u32, u32) {
        (150, 180)
    }

    /// Parse ranges from JSON and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or any validation error.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let ranges: Self =
            serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        ranges.validate()?;
        Ok(ranges)
    }

    /// Check that every range is ordered and physically meaningful.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_span("scenario.latitude", self.latitude, -90.0, 90.0)?;
        check_span("scenario.longitude", self.longitude, -180.0, 180.0)?;
        check_span(
            "scenario.year",
            (f64::from(self.year.0), f64::from(self.year.1)),
            1900.0,
            2100.0,
        )?;
        check_span(
            "scenario.planting_day",
            (f64::from(self.planting_day.0), f64::from(self.planting_day.1)),
            1.0,
            365.0,
        )
    }
}

impl Default for ScenarioRanges {
    fn default() -> Self {
        Self {
            latitude: Self::default_latitude(),
            longitude: Self::default_longitude(),
            year: Self::default_year(),
            planting_day: Self::default_planting_day(),
        }
    }
}

fn check_span(field: &'static str, (lo, hi): (f64, f64), min: f64, max: f64) -> Result<(), ConfigError> {
    if !(lo <= hi) {
        return Err(ConfigError::InvertedRange { field, min: lo, max: hi });
    }
    for value in [lo, hi] {
        if !(min..=max).contains(&value) {
            return Err(ConfigError::RangeViolation {
                field,
                min,
                max,
                value,
            });
        }
    }
    Ok(())
}

/// Seeded source of randomized episode configurations.
#[derive(Debug, Clone)]
pub struct ScenarioSampler {
    ranges: ScenarioRanges,
    rng: ChaCha20Rng,
}

impl ScenarioSampler {
    /// Sampler whose draws depend only on `ranges` and `seed`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the ranges are invalid.
    pub fn new(ranges: ScenarioRanges, seed: u64) -> Result<Self, ConfigError> {
        ranges.validate()?;
        Ok(Self {
            ranges,
            rng: stream_rng(seed, SCENARIO_STREAM),
        })
    }

    #[must_use]
    pub const fn ranges(&self) -> &ScenarioRanges {
        &self.ranges
    }

    /// Draw the next scenario on top of `base`: coordinates, calendar year and planting day
    /// are replaced, as is the weather seed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the drawn configuration does not validate.
    pub fn next_config(&mut self, base: &EpisodeConfig) -> Result<EpisodeConfig, ConfigError> {
        let (lat_lo, lat_hi) = self.ranges.latitude;
        let (lon_lo, lon_hi) = self.ranges.longitude;
        let latitude = if lat_lo < lat_hi {
            self.rng.gen_range(lat_lo..=lat_hi)
        } else {
            lat_lo
        };
        let longitude = if lon_lo < lon_hi {
            self.rng.gen_range(lon_lo..=lon_hi)
        } else {
            lon_lo
        };
        let year = self.rng.gen_range(self.ranges.year.0..=self.ranges.year.1);
        let planting_day = self
            .rng
            .gen_range(self.ranges.planting_day.0..=self.ranges.planting_day.1);

        let mut config = base.clone().with_planting(year, planting_day)?;
        config.location = Location::coordinates(latitude, longitude);
        config.seed = self.rng.r#gen();
        config.validate()?;
        log::debug!(
            "sampled scenario {} planted {} (seed {})",
            config.location,
            config.planting_date,
            config.seed
        );
        Ok(config)
    }
}
