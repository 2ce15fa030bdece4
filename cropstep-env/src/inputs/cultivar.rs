use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crop {
    #[default]
    Sorghum,
    Maize,
    Soybean,
}

impl Crop {
    pub const ALL: [Self; 3] = [Self::Sorghum, Self::Maize, Self::Soybean];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sorghum => "sorghum",
            Self::Maize => "maize",
            Self::Soybean => "soybean",
        }
    }

    /// Catalog entry used when the configuration names none.
    #[must_use]
    pub const fn default_cultivar(self) -> &'static str {
        match self {
            Self::Sorghum => "IB0026",
            Self::Maize => "IB1068",
            Self::Soybean => "IB0112",
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Crop {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|crop| crop.label() == normalized)
            .ok_or_else(|| ConfigError::Parse(format!("unknown crop '{value}'")))
    }
}

/// Growth parameters of one cultivar preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cultivar {
    pub crop: Crop,
    pub id: String,
    pub name: String,
    /// Temperature below which no thermal time accrues.
    pub base_temp_c: f64,
    /// Daily mean temperature above which thermal time stops increasing.
    pub optimum_temp_c: f64,
    /// Thermal time from planting to physiological maturity.
    pub gdd_to_maturity: f64,
    /// Radiation-use efficiency in grams of dry matter per MJ of intercepted PAR.
    pub rue_g_per_mj: f64,
    pub max_lai: f64,
    pub extinction_coefficient: f64,
    pub max_root_depth_cm: f64,
    pub root_growth_cm_per_day: f64,
    /// Stage at which canopy expansion stops and senescence begins.
    pub canopy_peak_stage: f64,
}

struct Preset {
    crop: Crop,
    id: &'static str,
    name: &'static str,
    base_temp_c: f64,
    optimum_temp_c: f64,
    gdd_to_maturity: f64,
    rue_g_per_mj: f64,
    max_lai: f64,
    extinction_coefficient: f64,
    max_root_depth_cm: f64,
    root_growth_cm_per_day: f64,
    canopy_peak_stage: f64,
}

const CATALOG: [Preset; 4] = [
    Preset {
        crop: Crop::Sorghum,
        id: "IB0026",
        name: "CSH-1 hybrid",
        base_temp_c: 8.0,
        optimum_temp_c: 34.0,
        gdd_to_maturity: 1_900.0,
        rue_g_per_mj: 3.2,
        max_lai: 5.0,
        extinction_coefficient: 0.6,
        max_root_depth_cm: 150.0,
        root_growth_cm_per_day: 2.2,
        canopy_peak_stage: 0.55,
    },
    Preset {
        crop: Crop::Maize,
        id: "IB1068",
        name: "short season dent",
        base_temp_c: 8.0,
        optimum_temp_c: 34.0,
        gdd_to_maturity: 2_000.0,
        rue_g_per_mj: 3.6,
        max_lai: 5.5,
        extinction_coefficient: 0.65,
        max_root_depth_cm: 140.0,
        root_growth_cm_per_day: 2.5,
        canopy_peak_stage: 0.55,
    },
    Preset {
        crop: Crop::Maize,
        id: "IB1072",
        name: "long season dent",
        base_temp_c: 8.0,
        optimum_temp_c: 34.0,
        gdd_to_maturity: 2_400.0,
        rue_g_per_mj: 3.6,
        max_lai: 6.0,
        extinction_coefficient: 0.65,
        max_root_depth_cm: 160.0,
        root_growth_cm_per_day: 2.5,
        canopy_peak_stage: 0.55,
    },
    Preset {
        crop: Crop::Soybean,
        id: "IB0112",
        name: "maturity group 5",
        base_temp_c: 7.0,
        optimum_temp_c: 30.0,
        gdd_to_maturity: 1_700.0,
        rue_g_per_mj: 2.4,
        max_lai: 4.5,
        extinction_coefficient: 0.5,
        max_root_depth_cm: 120.0,
        root_growth_cm_per_day: 1.8,
        canopy_peak_stage: 0.6,
    },
];

impl Cultivar {
    /// Look up a preset by crop and id (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCultivar`] when no preset matches.
    pub fn lookup(crop: Crop, id: &str) -> Result<Self, ConfigError> {
        CATALOG
            .iter()
            .find(|preset| preset.crop == crop && preset.id.eq_ignore_ascii_case(id.trim()))
            .map(Self::from_preset)
            .ok_or_else(|| ConfigError::UnknownCultivar {
                crop: crop.label().to_string(),
                cultivar: id.to_string(),
            })
    }

    /// Every preset for a crop, in catalog order.
    #[must_use]
    pub fn catalog(crop: Crop) -> Vec<Self> {
        CATALOG
            .iter()
            .filter(|preset| preset.crop == crop)
            .map(Self::from_preset)
            .collect()
    }

    fn from_preset(preset: &Preset) -> Self {
        Self {
            crop: preset.crop,
            id: preset.id.to_string(),
            name: preset.name.to_string(),
            base_temp_c: preset.base_temp_c,
            optimum_temp_c: preset.optimum_temp_c,
            gdd_to_maturity: preset.gdd_to_maturity,
            rue_g_per_mj: preset.rue_g_per_mj,
            max_lai: preset.max_lai,
            extinction_coefficient: preset.extinction_coefficient,
            max_root_depth_cm: preset.max_root_depth_cm,
            root_growth_cm_per_day: preset.root_growth_cm_per_day,
            canopy_peak_stage: preset.canopy_peak_stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_crop_default_is_in_the_catalog() {
        for crop in Crop::ALL {
            let cultivar = Cultivar::lookup(crop, crop.default_cultivar()).unwrap();
            assert_eq!(cultivar.crop, crop);
        }
        assert_eq!(Cultivar::catalog(Crop::Maize).len(), 2);
    }

    #[test]
    fn lookup_is_case_insensitive_and_crop_scoped() {
        assert!(Cultivar::lookup(Crop::Sorghum, "ib0026").is_ok());
        assert!(matches!(
            Cultivar::lookup(Crop::Soybean, "IB0026"),
            Err(ConfigError::UnknownCultivar { .. })
        ));
        assert_eq!("Maize".parse::<Crop>().unwrap(), Crop::Maize);
    }
}
