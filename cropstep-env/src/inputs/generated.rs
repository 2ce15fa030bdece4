use std::f64::consts::TAU;

use chrono::{Datelike, Duration};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use super::{InputRequest, InputSource, SoilLayer, SoilProfile, WeatherDay, WeatherSeries};
use crate::config::Location;
use crate::error::DataAcquisitionError;
use crate::seed::{SOIL_STREAM, WEATHER_STREAM, seed_from_label, stream_rng};
use crate::sim::extraterrestrial_radiation;

/// Deterministic synthetic weather and soil for a coordinate pair.
///
/// Weather follows a monsoonal climate: a hot dry spring, a wet season peaking in August,
/// and a cooler dry winter. The same request and seed always produce the same series.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSource {
    /// Mean daily maximum temperature at 12 degrees latitude, before seasonal swings.
    pub base_tmax_c: f64,
    /// Multiplier on wet-day rain amounts.
    pub rain_scale: f64,
    /// Day of year at the centre of the wet season.
    pub wet_season_peak_doy: u32,
}

impl Default for GeneratedSource {
    fn default() -> Self {
        Self {
            base_tmax_c: 32.0,
            rain_scale: 1.0,
            wet_season_peak_doy: 225,
        }
    }
}

impl GeneratedSource {
    fn coordinates(request: &InputRequest) -> Result<(f64, f64), DataAcquisitionError> {
        match request.location {
            Location::Coordinates {
                latitude,
                longitude,
            } => Ok((latitude, longitude)),
            Location::Station { .. } => Err(DataAcquisitionError::Other(
                "generated inputs need coordinates".to_string(),
            )),
        }
    }

    fn wet_season_factor(&self, day_of_year: u32) -> f64 {
        let offset = (f64::from(day_of_year) - f64::from(self.wet_season_peak_doy)) / 365.0;
        let shape = (offset * TAU).cos();
        (shape - 0.2).max(0.0) / 0.8
    }

    fn generate_day(
        &self,
        rng: &mut ChaCha20Rng,
        latitude: f64,
        date: chrono::NaiveDate,
    ) -> WeatherDay {
        let doy = date.ordinal();
        let wet = self.wet_season_factor(doy);
        let pre_monsoon_heat = ((f64::from(doy) - 130.0) / 365.0 * TAU).cos();

        let is_wet = rng.r#gen::<f64>() < 0.06 + 0.5 * wet;
        let rain = if is_wet {
            let u: f64 = rng.gen_range(1e-6..1.0);
            let mean = (5.0 + 12.0 * wet) * self.rain_scale;
            (-mean * u.ln()).min(150.0)
        } else {
            0.0
        };

        let latitude_shift = 0.4 * (latitude.abs() - 12.0);
        let mut tmax = self.base_tmax_c + 4.0 * pre_monsoon_heat - 3.0 * wet - latitude_shift
            + rng.gen_range(-1.5..1.5);
        if is_wet {
            tmax -= 2.0;
        }
        let diurnal = 11.0 - 4.0 * wet + rng.gen_range(-1.0..1.0);
        let tmin = tmax - diurnal;

        let clearness = (0.8 - 0.3 * wet - if is_wet { 0.25 } else { 0.0 }
            + rng.gen_range(-0.1..0.1))
        .clamp(0.1, 1.0);
        let srad = extraterrestrial_radiation(latitude, doy) * (0.25 + 0.5 * clearness);

        WeatherDay {
            date,
            srad,
            tmax,
            tmin,
            rain,
        }
    }
}

impl InputSource for GeneratedSource {
    fn name(&self) -> &str {
        "generated"
    }

    fn load_weather(&self, request: &InputRequest) -> Result<WeatherSeries, DataAcquisitionError> {
        let (latitude, longitude) = Self::coordinates(request)?;
        let station = request.location.key();
        let mut rng = stream_rng(request.seed ^ seed_from_label(&station), WEATHER_STREAM);
        let days = (0..request.day_count())
            .filter_map(|offset| i64::try_from(offset).ok())
            .map(|offset| {
                let date = request.first_date + Duration::days(offset);
                self.generate_day(&mut rng, latitude, date)
            })
            .collect();
        Ok(WeatherSeries {
            station,
            latitude,
            longitude,
            elevation_m: 0.0,
            days,
        })
    }

    fn load_soil(&self, request: &InputRequest) -> Result<SoilProfile, DataAcquisitionError> {
        Self::coordinates(request)?;
        let mut rng = stream_rng(seed_from_label(&request.soil_id), SOIL_STREAM);
        let mut profile = SoilProfile::red_sandy_loam(&request.soil_id);
        let base_lower: f64 = rng.gen_range(0.09..0.14);
        let base_capacity: f64 = rng.gen_range(0.12..0.18);
        profile.drainage_rate = rng.gen_range(0.4..0.8);
        profile.runoff_curve = rng.gen_range(60.0..80.0);
        for (depth_index, layer) in profile.layers.iter_mut().enumerate() {
            let clay_gain = 0.01 * f64::from(u8::try_from(depth_index).unwrap_or(u8::MAX));
            let lower_limit = base_lower + clay_gain;
            let drained_upper = lower_limit + base_capacity;
            *layer = SoilLayer {
                lower_limit,
                drained_upper,
                saturation: drained_upper + rng.gen_range(0.12..0.16),
                ..*layer
            };
        }
        Ok(profile)
    }
}
