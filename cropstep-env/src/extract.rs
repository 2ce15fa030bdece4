//! Output extraction: simulator rows to canonical raw fields for one day.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::SimulationError;
use crate::gateway::DailyResultRow;
use crate::history::IrrigationHistory;
use crate::inputs::SoilProfile;
use crate::numbers::u32_to_f64;
use crate::schema::{FIELD_SCHEMA, OBSERVATION_DIM, ObservationField};

/// Simulator column names consumed by the extractor.
pub mod columns {
    pub const DAS: &str = "DAS";
    pub const STAGE: &str = "GSTD";
    pub const LAI: &str = "LAID";
    pub const BIOMASS: &str = "CWAD";
    pub const GDD: &str = "GDDC";
    pub const AVAILABLE_WATER: &str = "SWXD";
    pub const WATER_STRESS: &str = "WSGD";
    pub const RAIN: &str = "PREC";
    pub const TMIN: &str = "TMIN";
    pub const TMAX: &str = "TMAX";
    pub const TAVG: &str = "TAVD";
    pub const SRAD: &str = "SRAD";
    pub const ET0: &str = "ET0D";
    pub const IRRIGATION: &str = "IRRD";
    pub const DRAINAGE: &str = "DRND";

    /// Volumetric water content column for a 1-based soil layer.
    #[must_use]
    pub fn soil_water(layer: usize) -> String {
        format!("SW{layer}D")
    }
}

/// Unnormalized values of every observation field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFields {
    values: [f64; OBSERVATION_DIM],
}

impl RawFields {
    /// Every field set to its documented sentinel.
    #[must_use]
    pub fn sentinels() -> Self {
        let mut values = [0.0; OBSERVATION_DIM];
        for (slot, spec) in values.iter_mut().zip(FIELD_SCHEMA.iter()) {
            *slot = spec.sentinel;
        }
        Self { values }
    }

    #[must_use]
    pub fn get(&self, field: ObservationField) -> f64 {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: ObservationField, value: f64) {
        self.values[field.index()] = value;
    }

    #[must_use]
    pub const fn values(&self) -> &[f64; OBSERVATION_DIM] {
        &self.values
    }

    #[must_use]
    pub fn phenological_stage(&self) -> f64 {
        self.get(ObservationField::PhenologicalStage)
    }

    #[must_use]
    pub fn water_stress(&self) -> f64 {
        self.get(ObservationField::WaterStressFactor)
    }

    #[must_use]
    pub fn total_biomass(&self) -> f64 {
        self.get(ObservationField::TotalBiomass)
    }

    /// Mean volumetric water content over the three reported depth bands.
    #[must_use]
    pub fn avg_soil_water(&self) -> f64 {
        (self.get(ObservationField::SoilWater0To30)
            + self.get(ObservationField::SoilWater30To60)
            + self.get(ObservationField::SoilWater60To100))
            / 3.0
    }
}

/// Fields substituted for one extraction; rarely more than a handful.
pub type SentinelSet = SmallVec<[ObservationField; 4]>;

/// Raw fields for one day plus bookkeeping about how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub raw: RawFields,
    /// Fields that were missing and replaced by their sentinel.
    pub sentinel_fields: SentinelSet,
    /// Day of the row actually read.
    pub row_day: u32,
    /// True when the requested day was past the returned rows and the last row was used.
    pub row_fallback: bool,
}

/// Maps simulator rows onto the canonical schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputExtractor {
    layer_bottoms_cm: Vec<f64>,
}

/// Depth bands (exclusive top, inclusive bottom) reported in the observation.
const SOIL_BANDS: [(ObservationField, f64, f64); 3] = [
    (ObservationField::SoilWater0To30, 0.0, 30.0),
    (ObservationField::SoilWater30To60, 30.0, 60.0),
    (ObservationField::SoilWater60To100, 60.0, 100.0),
];

impl OutputExtractor {
    #[must_use]
    pub fn new(soil: &SoilProfile) -> Self {
        Self::with_layer_bottoms(soil.layers.iter().map(|layer| layer.bottom_cm).collect())
    }

    #[must_use]
    pub const fn with_layer_bottoms(layer_bottoms_cm: Vec<f64>) -> Self {
        Self { layer_bottoms_cm }
    }

    /// Extract the raw fields for `day` from a full-season result.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::MissingRows`] when the simulator produced no rows at all.
    pub fn extract(
        &self,
        rows: &[DailyResultRow],
        day: u32,
        history: &IrrigationHistory,
    ) -> Result<Extraction, SimulationError> {
        let (index, row_fallback) = match find_row(rows, day) {
            Some(index) => (index, false),
            None if !rows.is_empty() => (rows.len() - 1, true),
            None => return Err(SimulationError::MissingRows { day }),
        };
        let row = &rows[index];
        let mut raw = RawFields::sentinels();
        let mut sentinel_fields = SentinelSet::new();
        let mut put = |field: ObservationField, value: Option<f64>| match value {
            Some(value) => raw.set(field, value),
            None => sentinel_fields.push(field),
        };

        put(ObservationField::DaysAfterPlanting, Some(u32_to_f64(row.das)));
        put(ObservationField::PhenologicalStage, row.get(columns::STAGE));
        put(ObservationField::LeafAreaIndex, row.get(columns::LAI));
        put(ObservationField::TotalBiomass, row.get(columns::BIOMASS));
        put(ObservationField::CumulativeGdd, row.get(columns::GDD));

        for (field, top, bottom) in SOIL_BANDS {
            put(field, self.band_mean(row, top, bottom));
        }
        put(ObservationField::AvailableWaterFraction, row.get(columns::AVAILABLE_WATER));
        put(ObservationField::WaterStressFactor, row.get(columns::WATER_STRESS));
        put(ObservationField::DaysSinceLastRain, Some(days_since_rain(rows, index)));

        put(ObservationField::Rainfall1d, row.get(columns::RAIN));
        put(ObservationField::Rainfall3d, Some(trailing_rain(rows, index, 3)));
        put(ObservationField::Rainfall7d, Some(trailing_rain(rows, index, 7)));
        let tmin = row.get(columns::TMIN);
        let tmax = row.get(columns::TMAX);
        put(ObservationField::TempMin, tmin);
        put(ObservationField::TempMax, tmax);
        let tavg = row.get(columns::TAVG).or_else(|| match (tmin, tmax) {
            (Some(lo), Some(hi)) => Some(f64::midpoint(lo, hi)),
            _ => None,
        });
        put(ObservationField::TempAvg, tavg);
        put(ObservationField::SolarRadiation, row.get(columns::SRAD));
        put(ObservationField::ReferenceEt, row.get(columns::ET0));
        let forecast = match rows.get(index + 1) {
            Some(next) if !row_fallback => next.get(columns::RAIN),
            _ => Some(0.0),
        };
        put(ObservationField::ForecastRainNext, forecast);

        put(ObservationField::LastAmount, Some(history.last_amount()));
        put(ObservationField::AmountT1, Some(history.lag(1)));
        put(ObservationField::AmountT2, Some(history.lag(2)));
        put(ObservationField::AmountT3, Some(history.lag(3)));
        put(ObservationField::AmountT4, Some(history.lag(4)));
        put(
            ObservationField::DaysSinceLastIrrigation,
            Some(history.days_since_last_irrigation(day)),
        );
        put(ObservationField::CumulativeIrrigation, Some(history.cumulative_mm()));
        put(ObservationField::IrrigationIntervalAvg, Some(history.interval_avg()));

        if !sentinel_fields.is_empty() {
            log::warn!(
                "day {day}: substituted sentinels for {:?}",
                sentinel_fields.iter().map(|field| field.name()).collect::<Vec<_>>()
            );
        }

        Ok(Extraction {
            raw,
            sentinel_fields,
            row_day: row.das,
            row_fallback,
        })
    }

    fn band_mean(&self, row: &DailyResultRow, top: f64, bottom: f64) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0_u32;
        for (idx, &depth) in self.layer_bottoms_cm.iter().enumerate() {
            if depth > top
                && depth <= bottom
                && let Some(value) = row.get(&columns::soil_water(idx + 1))
            {
                sum += value;
                count += 1;
            }
        }
        (count > 0).then(|| sum / f64::from(count))
    }
}

fn find_row(rows: &[DailyResultRow], day: u32) -> Option<usize> {
    rows.binary_search_by_key(&day, |row| row.das).ok()
}

fn rain_on(row: &DailyResultRow) -> f64 {
    row.get(columns::RAIN).unwrap_or(0.0).max(0.0)
}

fn trailing_rain(rows: &[DailyResultRow], index: usize, days: u32) -> f64 {
    let end_day = rows[index].das;
    let start_day = end_day.saturating_sub(days - 1);
    rows[..=index]
        .iter()
        .rev()
        .take_while(|row| row.das >= start_day)
        .map(rain_on)
        .sum()
}

fn days_since_rain(rows: &[DailyResultRow], index: usize) -> f64 {
    let today = rows[index].das;
    let last_wet = rows[..=index]
        .iter()
        .rev()
        .find(|row| rain_on(row) > 0.0)
        .map_or(rows[0].das, |row| row.das);
    u32_to_f64(today - last_wet)
}
