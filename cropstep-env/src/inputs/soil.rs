use serde::{Deserialize, Serialize};

use crate::error::DataAcquisitionError;
use crate::numbers::coordinate_code;

/// Layer bottoms (cm) of the SoilGrids depth intervals.
pub const SOILGRIDS_BOTTOMS_CM: [f64; 6] = [5.0, 15.0, 30.0, 60.0, 100.0, 200.0];

/// Root growth factor per SoilGrids interval.
const SOILGRIDS_ROOT_FACTORS: [f64; 6] = [1.0, 1.0, 1.0, 0.8, 0.5, 0.2];

/// Volumetric water content assigned to every layer at planting.
pub const INITIAL_SOIL_WATER: f64 = 0.20;

const SOIL_ID_LEN: usize = 10;

/// Soil id for a location: `SG` followed by the truncated latitude and longitude codes.
#[must_use]
pub fn soil_id_for(latitude: f64, longitude: f64) -> String {
    let mut id = format!(
        "SG{:04}{:04}",
        coordinate_code(latitude),
        coordinate_code(longitude)
    );
    id.truncate(SOIL_ID_LEN);
    id
}

/// One soil layer; water contents are volumetric fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub bottom_cm: f64,
    /// Lower limit of plant-extractable water.
    pub lower_limit: f64,
    /// Drained upper limit (field capacity).
    pub drained_upper: f64,
    pub saturation: f64,
    pub root_growth_factor: f64,
    #[serde(default = "SoilLayer::default_initial_water")]
    pub initial_water: f64,
}

impl SoilLayer {
    const fn default_initial_water() -> f64 {
        INITIAL_SOIL_WATER
    }
}

/// Layered soil description consumed by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    pub soil_id: String,
    pub albedo: f64,
    /// Fraction of water above field capacity drained per day.
    pub drainage_rate: f64,
    /// Runoff curve number.
    pub runoff_curve: f64,
    /// Stage-one soil evaporation limit in mm.
    pub evaporation_limit_mm: f64,
    pub layers: Vec<SoilLayer>,
}

impl SoilProfile {
    /// Red sandy loam used when no measured texture is available.
    #[must_use]
    pub fn red_sandy_loam(soil_id: &str) -> Self {
        let layers = SOILGRIDS_BOTTOMS_CM
            .iter()
            .zip(SOILGRIDS_ROOT_FACTORS)
            .map(|(&bottom_cm, root_growth_factor)| SoilLayer {
                bottom_cm,
                lower_limit: 0.08,
                drained_upper: 0.18,
                saturation: 0.33,
                root_growth_factor,
                initial_water: INITIAL_SOIL_WATER,
            })
            .collect();
        Self {
            soil_id: soil_id.to_string(),
            albedo: 0.18,
            drainage_rate: 0.6,
            runoff_curve: 65.0,
            evaporation_limit_mm: 7.2,
            layers,
        }
    }

    /// Thickness of each layer in cm.
    #[must_use]
    pub fn thicknesses(&self) -> Vec<f64> {
        let mut top = 0.0;
        self.layers
            .iter()
            .map(|layer| {
                let thickness = layer.bottom_cm - top;
                top = layer.bottom_cm;
                thickness
            })
            .collect()
    }

    #[must_use]
    pub fn depth_cm(&self) -> f64 {
        self.layers.last().map_or(0.0, |layer| layer.bottom_cm)
    }

    /// Check that layers exist, deepen monotonically and have ordered water limits.
    ///
    /// # Errors
    ///
    /// Returns [`DataAcquisitionError::EmptySoilProfile`] or [`DataAcquisitionError::Other`].
    pub fn validate(&self) -> Result<(), DataAcquisitionError> {
        if self.layers.is_empty() {
            return Err(DataAcquisitionError::EmptySoilProfile {
                soil_id: self.soil_id.clone(),
            });
        }
        let mut top = 0.0;
        for layer in &self.layers {
            if !(layer.bottom_cm > top) {
                return Err(DataAcquisitionError::Other(format!(
                    "soil {} layer bottoms must increase (got {} after {top})",
                    self.soil_id, layer.bottom_cm
                )));
            }
            if !(0.0 <= layer.lower_limit
                && layer.lower_limit < layer.drained_upper
                && layer.drained_upper < layer.saturation
                && layer.saturation <= 1.0)
            {
                return Err(DataAcquisitionError::Other(format!(
                    "soil {} layer at {} cm has inconsistent water limits",
                    self.soil_id, layer.bottom_cm
                )));
            }
            top = layer.bottom_cm;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soil_ids_follow_coordinate_codes() {
        assert_eq!(soil_id_for(12.3811, 78.9366), "SG12387893");
        assert_eq!(soil_id_for(-5.5, 7.25), "SG05500725");
        assert_eq!(soil_id_for(12.0, 123.45).len(), 10);
    }

    #[test]
    fn fallback_profile_is_valid() {
        let soil = SoilProfile::red_sandy_loam("SG12387893");
        assert!(soil.validate().is_ok());
        assert_eq!(soil.thicknesses(), vec![5.0, 10.0, 15.0, 30.0, 40.0, 100.0]);
        assert!((soil.depth_cm() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_empty_and_unordered_layers() {
        let mut soil = SoilProfile::red_sandy_loam("X");
        soil.layers.swap(0, 1);
        assert!(matches!(soil.validate(), Err(DataAcquisitionError::Other(_))));
        soil.layers.clear();
        assert!(matches!(
            soil.validate(),
            Err(DataAcquisitionError::EmptySoilProfile { .. })
        ));
    }
}
