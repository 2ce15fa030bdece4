use crate::inputs::Cultivar;

/// Root depth at planting.
const INITIAL_ROOT_DEPTH_CM: f64 = 10.0;
/// Leaf area at emergence.
const EMERGENCE_LAI: f64 = 0.05;
/// Fraction of incoming shortwave radiation that is photosynthetically active.
const PAR_FRACTION: f64 = 0.5;
/// Fraction of peak canopy lost between the end of expansion and maturity.
const SENESCENCE_LOSS: f64 = 0.75;

/// Crop state advanced one day at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct CropGrowth {
    cultivar: Cultivar,
    cumulative_gdd: f64,
    lai: f64,
    biomass_kg_ha: f64,
    root_depth_cm: f64,
    peak_lai: f64,
    water_stress: f64,
}

impl CropGrowth {
    #[must_use]
    pub fn new(cultivar: Cultivar, max_root_depth_cm: f64) -> Self {
        let root_cap = cultivar.max_root_depth_cm.min(max_root_depth_cm);
        Self {
            cultivar,
            cumulative_gdd: 0.0,
            lai: 0.0,
            biomass_kg_ha: 0.0,
            root_depth_cm: INITIAL_ROOT_DEPTH_CM.min(root_cap),
            peak_lai: 0.0,
            water_stress: 0.0,
        }
    }

    #[must_use]
    pub fn stage(&self) -> f64 {
        (self.cumulative_gdd / self.cultivar.gdd_to_maturity).min(1.0)
    }

    #[must_use]
    pub fn is_mature(&self) -> bool {
        self.stage() >= 1.0
    }

    #[must_use]
    pub const fn cumulative_gdd(&self) -> f64 {
        self.cumulative_gdd
    }

    #[must_use]
    pub const fn lai(&self) -> f64 {
        self.lai
    }

    #[must_use]
    pub const fn biomass_kg_ha(&self) -> f64 {
        self.biomass_kg_ha
    }

    #[must_use]
    pub const fn root_depth_cm(&self) -> f64 {
        self.root_depth_cm
    }

    /// Water stress of the last simulated day; 0 is unstressed.
    #[must_use]
    pub const fn water_stress(&self) -> f64 {
        self.water_stress
    }

    /// Fraction of radiation intercepted by the canopy.
    #[must_use]
    pub fn cover(&self) -> f64 {
        1.0 - (-self.cultivar.extinction_coefficient * self.lai).exp()
    }

    /// Thermal time accrued at a daily mean temperature.
    #[must_use]
    pub fn thermal_time(&self, tavg: f64) -> f64 {
        (tavg - self.cultivar.base_temp_c)
            .clamp(0.0, self.cultivar.optimum_temp_c - self.cultivar.base_temp_c)
    }

    fn potential_lai(&self, stage: f64) -> f64 {
        self.cultivar.max_lai / (1.0 + (-12.0 * (stage - 0.25)).exp())
    }

    /// Advance one day given weather and the water-supply ratio (actual over potential
    /// transpiration).
    pub fn advance(&mut self, tavg: f64, srad: f64, supply_ratio: f64, max_root_depth_cm: f64) {
        if self.is_mature() {
            self.water_stress = 0.0;
            return;
        }
        let stress = (1.0 - supply_ratio).clamp(0.0, 1.0);
        self.water_stress = stress;

        let intercepted_par = PAR_FRACTION * srad.max(0.0) * self.cover();
        let growth_g_m2 = self.cultivar.rue_g_per_mj * intercepted_par * (1.0 - stress);
        self.biomass_kg_ha += growth_g_m2 * 10.0;

        let thermal = self.thermal_time(tavg);
        let old_stage = self.stage();
        self.cumulative_gdd += thermal;
        let new_stage = self.stage();

        if new_stage <= self.cultivar.canopy_peak_stage {
            let expansion = (self.potential_lai(new_stage) - self.potential_lai(old_stage)).max(0.0);
            self.lai = (self.lai.max(EMERGENCE_LAI) + expansion * (1.0 - 0.7 * stress))
                .min(self.cultivar.max_lai);
            self.peak_lai = self.peak_lai.max(self.lai);
        } else {
            let remaining = (1.0 - self.cultivar.canopy_peak_stage).max(f64::EPSILON);
            let loss = self.peak_lai * SENESCENCE_LOSS * (new_stage - old_stage) / remaining;
            self.lai = (self.lai - loss * (1.0 + stress)).max(0.0);
        }

        let root_cap = self.cultivar.max_root_depth_cm.min(max_root_depth_cm);
        let span = self.cultivar.optimum_temp_c - self.cultivar.base_temp_c;
        let root_growth = self.cultivar.root_growth_cm_per_day * (thermal / span.max(1.0) * 2.0).min(1.0);
        self.root_depth_cm = (self.root_depth_cm + root_growth).min(root_cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::Crop;

    fn sorghum() -> CropGrowth {
        CropGrowth::new(Cultivar::lookup(Crop::Sorghum, "IB0026").unwrap(), 200.0)
    }

    #[test]
    fn unstressed_crop_grows_and_matures() {
        let mut crop = sorghum();
        let mut days = 0;
        while !crop.is_mature() && days < 300 {
            crop.advance(28.0, 20.0, 1.0, 200.0);
            days += 1;
        }
        assert!(crop.is_mature());
        assert!((90..=110).contains(&days), "{days}");
        assert!(crop.biomass_kg_ha() > 8_000.0 && crop.biomass_kg_ha() < 30_000.0);
        assert!((crop.root_depth_cm() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stress_slows_growth() {
        let mut wet = sorghum();
        let mut dry = sorghum();
        for _ in 0..60 {
            wet.advance(28.0, 20.0, 1.0, 200.0);
            dry.advance(28.0, 20.0, 0.3, 200.0);
        }
        assert!(dry.biomass_kg_ha() < wet.biomass_kg_ha());
        assert!(dry.lai() < wet.lai());
        assert!((dry.water_stress() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn cold_days_accrue_no_thermal_time() {
        let crop = sorghum();
        assert!(crop.thermal_time(5.0).abs() < f64::EPSILON);
        assert!((crop.thermal_time(40.0) - 26.0).abs() < f64::EPSILON);
    }
}
