//! Min-max scaling of raw fields into the unit interval.
use serde::{Deserialize, Serialize};

use crate::extract::RawFields;
use crate::numbers::clamp_f64_to_f32;
use crate::schema::{FIELD_SCHEMA, FieldSpec, OBSERVATION_DIM, ObservationField};

/// Normalized observation vector handed to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    values: [f64; OBSERVATION_DIM],
}

impl Observation {
    #[must_use]
    pub const fn from_values(values: [f64; OBSERVATION_DIM]) -> Self {
        Self { values }
    }

    /// All-zero vector, returned alongside failures before any state exists.
    #[must_use]
    pub const fn zeros() -> Self {
        Self {
            values: [0.0; OBSERVATION_DIM],
        }
    }

    #[must_use]
    pub const fn values(&self) -> &[f64; OBSERVATION_DIM] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, field: ObservationField) -> f64 {
        self.values[field.index()]
    }

    /// Single-precision copy for agents that train in f32.
    #[must_use]
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.values.iter().copied().map(clamp_f64_to_f32).collect()
    }
}

/// Scale one value into `[0, 1]` using the field's bounds.
#[must_use]
pub fn normalize_value(spec: &FieldSpec, value: f64) -> f64 {
    if !value.is_finite() {
        return if value == f64::INFINITY { 1.0 } else { 0.0 };
    }
    ((value - spec.min) / spec.span()).clamp(0.0, 1.0)
}

/// Map a normalized value back onto the field's physical range.
#[must_use]
pub fn denormalize_value(spec: &FieldSpec, value: f64) -> f64 {
    spec.min + value * spec.span()
}

/// Normalize every raw field in schema order.
#[must_use]
pub fn normalize(raw: &RawFields) -> Observation {
    let mut values = [0.0; OBSERVATION_DIM];
    for (slot, spec) in values.iter_mut().zip(FIELD_SCHEMA.iter()) {
        *slot = normalize_value(spec, raw.get(spec.field));
    }
    Observation { values }
}

/// Recover physical values from a normalized observation. Clamped inputs stay clamped.
#[must_use]
pub fn denormalize(observation: &Observation) -> [f64; OBSERVATION_DIM] {
    let mut values = [0.0; OBSERVATION_DIM];
    for ((slot, spec), value) in values
        .iter_mut()
        .zip(FIELD_SCHEMA.iter())
        .zip(observation.values.iter())
    {
        *slot = denormalize_value(spec, *value);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_map_to_unit_interval_endpoints() {
        for spec in &FIELD_SCHEMA {
            assert!(normalize_value(spec, spec.min).abs() < 1e-12, "{}", spec.name);
            assert!((normalize_value(spec, spec.max) - 1.0).abs() < 1e-12, "{}", spec.name);
        }
    }

    #[test]
    fn out_of_range_and_non_finite_values_clamp() {
        let spec = ObservationField::TempMax.spec();
        assert!(normalize_value(spec, -40.0).abs() < f64::EPSILON);
        assert!((normalize_value(spec, 90.0) - 1.0).abs() < f64::EPSILON);
        assert!(normalize_value(spec, f64::NAN).abs() < f64::EPSILON);
        assert!((normalize_value(spec, f64::INFINITY) - 1.0).abs() < f64::EPSILON);
        assert!(normalize_value(spec, f64::NEG_INFINITY).abs() < f64::EPSILON);
    }

    #[test]
    fn denormalize_recovers_in_range_values() {
        let mut raw = RawFields::sentinels();
        raw.set(ObservationField::TotalBiomass, 5_000.0);
        raw.set(ObservationField::SoilWater0To30, 0.32);
        let observation = normalize(&raw);
        assert!((observation.get(ObservationField::TotalBiomass) - 0.25).abs() < 1e-12);
        let restored = denormalize(&observation);
        assert!((restored[ObservationField::SoilWater0To30.index()] - 0.32).abs() < 1e-12);
        assert_eq!(observation.to_f32_vec().len(), OBSERVATION_DIM);
    }
}
