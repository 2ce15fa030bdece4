//! Canonical observation schema: field order, units, normalization bounds, and sentinels.
use serde::{Deserialize, Serialize};

/// Number of scalars in an observation vector.
pub const OBSERVATION_DIM: usize = 28;

/// Logical grouping of observation fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Crop,
    Soil,
    Weather,
    IrrigationHistory,
}

/// One field of the observation vector. Discriminants are the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationField {
    DaysAfterPlanting = 0,
    PhenologicalStage,
    LeafAreaIndex,
    TotalBiomass,
    CumulativeGdd,
    SoilWater0To30,
    SoilWater30To60,
    SoilWater60To100,
    AvailableWaterFraction,
    WaterStressFactor,
    DaysSinceLastRain,
    Rainfall1d,
    Rainfall3d,
    Rainfall7d,
    TempMin,
    TempMax,
    TempAvg,
    SolarRadiation,
    ReferenceEt,
    ForecastRainNext,
    LastAmount,
    AmountT1,
    AmountT2,
    AmountT3,
    AmountT4,
    DaysSinceLastIrrigation,
    CumulativeIrrigation,
    IrrigationIntervalAvg,
}

impl ObservationField {
    /// All fields in vector order.
    pub const ALL: [Self; OBSERVATION_DIM] = [
        Self::DaysAfterPlanting,
        Self::PhenologicalStage,
        Self::LeafAreaIndex,
        Self::TotalBiomass,
        Self::CumulativeGdd,
        Self::SoilWater0To30,
        Self::SoilWater30To60,
        Self::SoilWater60To100,
        Self::AvailableWaterFraction,
        Self::WaterStressFactor,
        Self::DaysSinceLastRain,
        Self::Rainfall1d,
        Self::Rainfall3d,
        Self::Rainfall7d,
        Self::TempMin,
        Self::TempMax,
        Self::TempAvg,
        Self::SolarRadiation,
        Self::ReferenceEt,
        Self::ForecastRainNext,
        Self::LastAmount,
        Self::AmountT1,
        Self::AmountT2,
        Self::AmountT3,
        Self::AmountT4,
        Self::DaysSinceLastIrrigation,
        Self::CumulativeIrrigation,
        Self::IrrigationIntervalAvg,
    ];

    /// Position of the field inside the observation vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Static specification (name, unit, bounds, sentinel) for the field.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        &FIELD_SCHEMA[self as usize]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

/// Unit, bounds and sentinel of a single observation field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub field: ObservationField,
    pub group: FieldGroup,
    pub name: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    /// Value substituted when the simulator output lacks the field on a given day.
    pub sentinel: f64,
}

impl FieldSpec {
    /// Width of the normalization interval.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

const fn spec(
    field: ObservationField,
    group: FieldGroup,
    name: &'static str,
    unit: &'static str,
    min: f64,
    max: f64,
    sentinel: f64,
) -> FieldSpec {
    FieldSpec {
        field,
        group,
        name,
        unit,
        min,
        max,
        sentinel,
    }
}

use FieldGroup::{Crop, IrrigationHistory, Soil, Weather};
use ObservationField as F;

/// Fixed normalization table in vector order.
///
/// Sentinels are the lower bound of each field except for soil water content, which falls
/// back to 0.20 m³/m³ (a moderately dry loam), and the irrigation interval, which falls
/// back to its upper bound ("no established rhythm").
pub static FIELD_SCHEMA: [FieldSpec; OBSERVATION_DIM] = [
    spec(F::DaysAfterPlanting, Crop, "days_after_planting", "d", 0.0, 200.0, 0.0),
    spec(F::PhenologicalStage, Crop, "phenological_stage", "-", 0.0, 1.0, 0.0),
    spec(F::LeafAreaIndex, Crop, "leaf_area_index", "m2/m2", 0.0, 8.0, 0.0),
    spec(F::TotalBiomass, Crop, "total_biomass", "kg/ha", 0.0, 20_000.0, 0.0),
    spec(F::CumulativeGdd, Crop, "cumulative_gdd", "degC*d", 0.0, 3_000.0, 0.0),
    spec(F::SoilWater0To30, Soil, "soil_water_0_30", "m3/m3", 0.1, 0.5, 0.20),
    spec(F::SoilWater30To60, Soil, "soil_water_30_60", "m3/m3", 0.1, 0.5, 0.20),
    spec(F::SoilWater60To100, Soil, "soil_water_60_100", "m3/m3", 0.1, 0.5, 0.20),
    spec(F::AvailableWaterFraction, Soil, "available_water_fraction", "-", 0.0, 1.0, 0.0),
    spec(F::WaterStressFactor, Soil, "water_stress_factor", "-", 0.0, 1.0, 0.0),
    spec(F::DaysSinceLastRain, Soil, "days_since_last_rain", "d", 0.0, 60.0, 0.0),
    spec(F::Rainfall1d, Weather, "rainfall_1d", "mm", 0.0, 100.0, 0.0),
    spec(F::Rainfall3d, Weather, "rainfall_3d", "mm", 0.0, 200.0, 0.0),
    spec(F::Rainfall7d, Weather, "rainfall_7d", "mm", 0.0, 300.0, 0.0),
    spec(F::TempMin, Weather, "temp_min", "degC", 0.0, 40.0, 0.0),
    spec(F::TempMax, Weather, "temp_max", "degC", 15.0, 50.0, 15.0),
    spec(F::TempAvg, Weather, "temp_avg", "degC", 10.0, 45.0, 10.0),
    spec(F::SolarRadiation, Weather, "solar_radiation", "MJ/m2/d", 5.0, 35.0, 5.0),
    spec(F::ReferenceEt, Weather, "reference_et", "mm/d", 1.0, 12.0, 1.0),
    spec(F::ForecastRainNext, Weather, "forecast_rain_next", "mm", 0.0, 100.0, 0.0),
    spec(F::LastAmount, IrrigationHistory, "last_amount", "mm", 0.0, 100.0, 0.0),
    spec(F::AmountT1, IrrigationHistory, "amount_t1", "mm", 0.0, 100.0, 0.0),
    spec(F::AmountT2, IrrigationHistory, "amount_t2", "mm", 0.0, 100.0, 0.0),
    spec(F::AmountT3, IrrigationHistory, "amount_t3", "mm", 0.0, 100.0, 0.0),
    spec(F::AmountT4, IrrigationHistory, "amount_t4", "mm", 0.0, 100.0, 0.0),
    spec(F::DaysSinceLastIrrigation, IrrigationHistory, "days_since_last_irrigation", "d", 0.0, 30.0, 0.0),
    spec(F::CumulativeIrrigation, IrrigationHistory, "cumulative_irrigation", "mm", 0.0, 1_000.0, 0.0),
    spec(F::IrrigationIntervalAvg, IrrigationHistory, "irrigation_interval_avg", "d", 1.0, 30.0, 30.0),
];
