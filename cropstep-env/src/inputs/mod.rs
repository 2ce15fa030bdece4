//! Static simulator inputs (weather, soil, cultivar) and the sources that provide them.
mod cultivar;
mod generated;
mod local;
mod soil;
mod weather;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use cultivar::{Crop, Cultivar};
pub use generated::GeneratedSource;
pub use local::LocalSource;
pub use soil::{INITIAL_SOIL_WATER, SOILGRIDS_BOTTOMS_CM, SoilLayer, SoilProfile, soil_id_for};
pub use weather::{WeatherDay, WeatherSeries};

use crate::config::{EpisodeConfig, Location};
use crate::error::DataAcquisitionError;
use crate::numbers::usize_to_f64;

/// What an input source is asked to provide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    pub location: Location,
    pub soil_id: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub seed: u64,
}

impl InputRequest {
    #[must_use]
    pub fn from_config(config: &EpisodeConfig) -> Self {
        let (first_date, last_date) = config.weather_span();
        Self {
            location: config.location.clone(),
            soil_id: config.soil_id(),
            first_date,
            last_date,
            seed: config.seed,
        }
    }

    /// Inclusive number of days requested.
    #[must_use]
    pub fn day_count(&self) -> usize {
        usize::try_from((self.last_date - self.first_date).num_days() + 1).unwrap_or(0)
    }
}

/// Provider of weather and soil data for a request.
///
/// Implementations stand in for download clients, local file loaders, or generators.
pub trait InputSource {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Daily weather covering the request span.
    ///
    /// # Errors
    ///
    /// Returns a [`DataAcquisitionError`] when the data cannot be obtained or decoded.
    fn load_weather(&self, request: &InputRequest) -> Result<WeatherSeries, DataAcquisitionError>;

    /// Soil profile for the request location.
    ///
    /// # Errors
    ///
    /// Returns a [`DataAcquisitionError`] when the profile cannot be obtained or decoded.
    fn load_soil(&self, request: &InputRequest) -> Result<SoilProfile, DataAcquisitionError>;
}

/// Everything besides the irrigation schedule that the simulator consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticInputs {
    pub weather: WeatherSeries,
    pub soil: SoilProfile,
    pub cultivar: Cultivar,
}

impl StaticInputs {
    /// Load and check inputs from `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`DataAcquisitionError`] when the source fails, the weather does not cover
    /// the requested span, or the soil profile is unusable.
    pub fn acquire(
        source: &dyn InputSource,
        request: &InputRequest,
        cultivar: Cultivar,
    ) -> Result<Self, DataAcquisitionError> {
        let weather = source
            .load_weather(request)?
            .clipped(request.first_date, request.last_date);
        weather.validate()?;
        if !weather.covers(request.first_date, request.last_date) {
            return Err(DataAcquisitionError::InsufficientWeather {
                available: weather.days.len(),
                required: request.day_count(),
            });
        }
        let soil = source.load_soil(request)?;
        soil.validate()?;
        log::info!(
            "{} inputs for {}: {} weather days (mean {:.1} C), soil {} with {} layers",
            source.name(),
            request.location,
            weather.days.len(),
            weather.tav(),
            soil.soil_id,
            soil.layers.len()
        );
        Ok(Self {
            weather,
            soil,
            cultivar,
        })
    }

    /// Mean daily rain over the loaded span, mm.
    #[must_use]
    pub fn mean_rain(&self) -> f64 {
        if self.weather.days.is_empty() {
            return 0.0;
        }
        self.weather.days.iter().map(|day| day.rain).sum::<f64>()
            / usize_to_f64(self.weather.days.len())
    }
}
