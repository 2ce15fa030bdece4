//! Reward calculation: composite stage-weighted reward and its alternatives.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extract::RawFields;

/// Divisor guard applied to the water-use-efficiency term.
const WUE_EPSILON: f64 = 1e-3;

/// Reward formula selected for an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    #[default]
    Composite,
    Simple,
    Biomass,
    YieldEfficiency,
    DynamicStage,
}

impl RewardMode {
    pub const ALL: [Self; 5] = [
        Self::Composite,
        Self::Simple,
        Self::Biomass,
        Self::YieldEfficiency,
        Self::DynamicStage,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Composite => "composite",
            Self::Simple => "simple",
            Self::Biomass => "biomass",
            Self::YieldEfficiency => "yield_efficiency",
            Self::DynamicStage => "dynamic_stage",
        }
    }
}

impl fmt::Display for RewardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RewardMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.label() == normalized)
            .ok_or_else(|| ConfigError::Parse(format!("unknown reward mode '{value}'")))
    }
}

/// Growth stages that receive the critical-stage multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Flowering,
    GrainFilling,
    PodFilling,
}

impl GrowthStage {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Flowering => "flowering",
            Self::GrainFilling => "grain_filling",
            Self::PodFilling => "pod_filling",
        }
    }
}

/// Half-open span `[start, end)` of the normalized phenological stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageWindow {
    pub stage: GrowthStage,
    pub start: f64,
    pub end: f64,
}

impl StageWindow {
    #[must_use]
    pub fn contains(&self, stage: f64) -> bool {
        stage >= self.start && stage < self.end
    }
}

/// Weight tuple applied to the four reward components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageWeights {
    pub crop_health: f64,
    pub soil_moisture: f64,
    pub water_use_efficiency: f64,
    pub conservation: f64,
}

impl StageWeights {
    /// Fixed weights of the composite reward.
    pub const COMPOSITE: Self = Self::new(0.4, 0.3, 0.2, 0.1);

    #[must_use]
    pub const fn new(crop_health: f64, soil_moisture: f64, water_use_efficiency: f64, conservation: f64) -> Self {
        Self {
            crop_health,
            soil_moisture,
            water_use_efficiency,
            conservation,
        }
    }

    /// Component-wise linear blend, `t = 0` gives `self`.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Self {
            crop_health: mix(self.crop_health, other.crop_health),
            soil_moisture: mix(self.soil_moisture, other.soil_moisture),
            water_use_efficiency: mix(self.water_use_efficiency, other.water_use_efficiency),
            conservation: mix(self.conservation, other.conservation),
        }
    }
}

/// Weights used for stages between the early and peak bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationPolicy {
    /// Blend linearly from the early band to the peak band.
    #[default]
    Interpolate,
    /// Keep the early band until the peak band starts.
    HoldEarly,
}

/// Stage bands of the dynamic stage-weighted reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicBands {
    #[serde(default = "DynamicBands::default_early")]
    pub early: StageWeights,
    #[serde(default = "DynamicBands::default_peak")]
    pub peak: StageWeights,
    #[serde(default = "DynamicBands::default_late")]
    pub late: StageWeights,
    #[serde(default = "DynamicBands::default_early_end")]
    pub early_end: f64,
    #[serde(default = "DynamicBands::default_peak_start")]
    pub peak_start: f64,
    #[serde(default = "DynamicBands::default_late_start")]
    pub late_start: f64,
    #[serde(default)]
    pub transition: InterpolationPolicy,
}

impl DynamicBands {
    const fn default_early() -> StageWeights {
        StageWeights::new(0.2, 0.2, 0.4, 0.2)
    }

    const fn default_peak() -> StageWeights {
        StageWeights::new(0.6, 0.3, 0.1, 0.0)
    }

    const fn default_late() -> StageWeights {
        StageWeights::new(0.1, 0.1, 0.1, 0.7)
    }

    const fn default_early_end() -> f64 {
        0.3
    }

    const fn default_peak_start() -> f64 {
        0.5
    }

    const fn default_late_start() -> f64 {
        0.8
    }

    /// Weights for a given normalized stage.
    #[must_use]
    pub fn weights_for(&self, stage: f64) -> StageWeights {
        if stage >= self.late_start {
            self.late
        } else if stage >= self.peak_start {
            self.peak
        } else if stage < self.early_end {
            self.early
        } else {
            match self.transition {
                InterpolationPolicy::HoldEarly => self.early,
                InterpolationPolicy::Interpolate => {
                    let t = (stage - self.early_end) / (self.peak_start - self.early_end);
                    self.early.lerp(&self.peak, t.clamp(0.0, 1.0))
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.early_end <= self.peak_start && self.peak_start <= self.late_start) {
            return Err(ConfigError::InvertedRange {
                field: "reward.dynamic.bands",
                min: self.early_end,
                max: self.late_start,
            });
        }
        Ok(())
    }
}

impl Default for DynamicBands {
    fn default() -> Self {
        Self {
            early: Self::default_early(),
            peak: Self::default_peak(),
            late: Self::default_late(),
            early_end: Self::default_early_end(),
            peak_start: Self::default_peak_start(),
            late_start: Self::default_late_start(),
            transition: InterpolationPolicy::default(),
        }
    }
}

/// Explicit reward configuration passed to the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub mode: RewardMode,
    #[serde(default = "RewardConfig::default_optimal_swc")]
    pub optimal_swc: f64,
    #[serde(default = "RewardConfig::default_critical_stages")]
    pub critical_stages: Vec<StageWindow>,
    #[serde(default = "RewardConfig::default_critical_multiplier")]
    pub critical_multiplier: f64,
    #[serde(default = "RewardConfig::default_stress_bonus")]
    pub stress_bonus: f64,
    #[serde(default = "RewardConfig::default_stress_bonus_min_wsf")]
    pub stress_bonus_min_wsf: f64,
    #[serde(default = "RewardConfig::default_stress_bonus_min_mm")]
    pub stress_bonus_min_mm: f64,
    /// Per-millimetre cost before the conservation weight is applied.
    #[serde(default = "RewardConfig::default_water_cost_per_mm")]
    pub water_cost_per_mm: f64,
    /// Biomass change (kg/ha) that maps to a gain of 1.0.
    #[serde(default = "RewardConfig::default_biomass_gain_scale")]
    pub biomass_gain_scale: f64,
    #[serde(default = "RewardConfig::default_failure_reward")]
    pub failure_reward: f64,
    #[serde(default)]
    pub dynamic: DynamicBands,
}

impl RewardConfig {
    const fn default_optimal_swc() -> f64 {
        0.30
    }

    fn default_critical_stages() -> Vec<StageWindow> {
        vec![
            StageWindow {
                stage: GrowthStage::Flowering,
                start: 0.45,
                end: 0.60,
            },
            StageWindow {
                stage: GrowthStage::PodFilling,
                start: 0.55,
                end: 0.80,
            },
            StageWindow {
                stage: GrowthStage::GrainFilling,
                start: 0.60,
                end: 0.85,
            },
        ]
    }

    const fn default_critical_multiplier() -> f64 {
        1.5
    }

    const fn default_stress_bonus() -> f64 {
        0.2
    }

    const fn default_stress_bonus_min_wsf() -> f64 {
        0.3
    }

    const fn default_stress_bonus_min_mm() -> f64 {
        10.0
    }

    const fn default_water_cost_per_mm() -> f64 {
        0.1
    }

    const fn default_biomass_gain_scale() -> f64 {
        20_000.0
    }

    const fn default_failure_reward() -> f64 {
        -200.0
    }

    /// Same configuration with a different formula.
    #[must_use]
    pub fn with_mode(mut self, mode: RewardMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check the reward parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the optimal soil water lies outside `[0, 1]`, a
    /// critical-stage window is inverted, the gain scale is not positive, or the dynamic
    /// bands are out of order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.optimal_swc) {
            return Err(ConfigError::RangeViolation {
                field: "reward.optimal_swc",
                min: 0.0,
                max: 1.0,
                value: self.optimal_swc,
            });
        }
        for window in &self.critical_stages {
            if !(window.start <= window.end) {
                return Err(ConfigError::InvertedRange {
                    field: "reward.critical_stages",
                    min: window.start,
                    max: window.end,
                });
            }
        }
        if !(self.critical_multiplier >= 0.0) {
            return Err(ConfigError::MinViolation {
                field: "reward.critical_multiplier",
                min: 0.0,
                value: self.critical_multiplier,
            });
        }
        if !(self.biomass_gain_scale > 0.0) {
            return Err(ConfigError::MinViolation {
                field: "reward.biomass_gain_scale",
                min: f64::MIN_POSITIVE,
                value: self.biomass_gain_scale,
            });
        }
        self.dynamic.validate()
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            mode: RewardMode::default(),
            optimal_swc: Self::default_optimal_swc(),
            critical_stages: Self::default_critical_stages(),
            critical_multiplier: Self::default_critical_multiplier(),
            stress_bonus: Self::default_stress_bonus(),
            stress_bonus_min_wsf: Self::default_stress_bonus_min_wsf(),
            stress_bonus_min_mm: Self::default_stress_bonus_min_mm(),
            water_cost_per_mm: Self::default_water_cost_per_mm(),
            biomass_gain_scale: Self::default_biomass_gain_scale(),
            failure_reward: Self::default_failure_reward(),
            dynamic: DynamicBands::default(),
        }
    }
}

/// Every intermediate of one reward evaluation, for `info` and logs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub mode: RewardMode,
    pub day_index: u32,
    pub biomass_gain: f64,
    pub crop_health: f64,
    pub soil_moisture: f64,
    pub water_use_efficiency: f64,
    pub conservation: f64,
    /// Weights applied to the components; absent for the single-formula modes.
    pub weights: Option<StageWeights>,
    pub bonus: f64,
    pub multiplier: f64,
    pub critical_stage: Option<GrowthStage>,
    pub total: f64,
}

/// Stateless reward function over consecutive raw field snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewardCalculator {
    config: RewardConfig,
}

impl RewardCalculator {
    #[must_use]
    pub const fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Normalized biomass change between two snapshots, clamped to `[-1, 1]`.
    #[must_use]
    pub fn biomass_gain(&self, prev: &RawFields, curr: &RawFields) -> f64 {
        let delta = curr.total_biomass() - prev.total_biomass();
        if !delta.is_finite() {
            return 0.0;
        }
        (delta / self.config.biomass_gain_scale).clamp(-1.0, 1.0)
    }

    /// First critical-stage window containing `stage`.
    #[must_use]
    pub fn critical_stage(&self, stage: f64) -> Option<GrowthStage> {
        self.config
            .critical_stages
            .iter()
            .find(|window| window.contains(stage))
            .map(|window| window.stage)
    }

    /// Score the transition from `prev` to `curr` given the accepted amount.
    #[must_use]
    pub fn calculate(&self, prev: &RawFields, curr: &RawFields, accepted_mm: f64, day_index: u32) -> RewardBreakdown {
        let cfg = &self.config;
        let amount = accepted_mm.max(0.0);
        let wsf = curr.water_stress().clamp(0.0, 1.0);
        let stage = curr.phenological_stage();
        let gain = self.biomass_gain(prev, curr);

        let crop_health = 1.0 - wsf;
        let soil_moisture = -(curr.avg_soil_water() - cfg.optimal_swc).abs();
        let water_use_efficiency = if amount > 0.0 {
            (gain / (amount + WUE_EPSILON)).min(1.0)
        } else {
            gain
        };
        let conservation = -amount * cfg.water_cost_per_mm;

        let mut breakdown = RewardBreakdown {
            mode: cfg.mode,
            day_index,
            biomass_gain: gain,
            crop_health,
            soil_moisture,
            water_use_efficiency,
            conservation,
            weights: None,
            bonus: 0.0,
            multiplier: 1.0,
            critical_stage: None,
            total: 0.0,
        };

        let weights = match cfg.mode {
            RewardMode::Simple => {
                breakdown.total = crop_health - 0.02 * amount;
                return breakdown;
            }
            RewardMode::Biomass => {
                breakdown.total = gain * 10.0 - amount * 0.01;
                return breakdown;
            }
            RewardMode::YieldEfficiency => {
                breakdown.total = if amount > 0.0 { gain / amount } else { gain };
                return breakdown;
            }
            RewardMode::Composite => StageWeights::COMPOSITE,
            RewardMode::DynamicStage => cfg.dynamic.weights_for(stage),
        };

        let weighted = crop_health * weights.crop_health
            + soil_moisture * weights.soil_moisture
            + water_use_efficiency * weights.water_use_efficiency
            + conservation * weights.conservation;
        let bonus = if wsf > cfg.stress_bonus_min_wsf && amount > cfg.stress_bonus_min_mm {
            cfg.stress_bonus
        } else {
            0.0
        };
        let critical_stage = self.critical_stage(stage);
        let multiplier = if critical_stage.is_some() {
            cfg.critical_multiplier
        } else {
            1.0
        };

        breakdown.weights = Some(weights);
        breakdown.bonus = bonus;
        breakdown.multiplier = multiplier;
        breakdown.critical_stage = critical_stage;
        breakdown.total = (weighted + bonus) * multiplier;
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObservationField;

    fn fields(stage: f64, wsf: f64, swc: f64, biomass: f64) -> RawFields {
        let mut raw = RawFields::sentinels();
        raw.set(ObservationField::PhenologicalStage, stage);
        raw.set(ObservationField::WaterStressFactor, wsf);
        raw.set(ObservationField::SoilWater0To30, swc);
        raw.set(ObservationField::SoilWater30To60, swc);
        raw.set(ObservationField::SoilWater60To100, swc);
        raw.set(ObservationField::TotalBiomass, biomass);
        raw
    }

    #[test]
    fn composite_matches_hand_computation() {
        let calc = RewardCalculator::default();
        let prev = fields(0.2, 0.5, 0.25, 1_000.0);
        let curr = fields(0.2, 0.5, 0.25, 1_200.0);
        let reward = calc.calculate(&prev, &curr, 20.0, 10);
        let gain = 200.0 / 20_000.0;
        let expected = 0.5 * 0.4 - 0.05 * 0.3 + (gain / 20.001) * 0.2 - 20.0 * 0.01 + 0.2;
        assert!((reward.total - expected).abs() < 1e-9, "{reward:?}");
        assert!((reward.multiplier - 1.0).abs() < f64::EPSILON);
        assert!((reward.bonus - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn critical_stage_scales_the_sum() {
        let calc = RewardCalculator::default();
        let prev = fields(0.5, 0.1, 0.30, 4_000.0);
        let curr = fields(0.5, 0.1, 0.30, 4_000.0);
        let reward = calc.calculate(&prev, &curr, 0.0, 60);
        assert_eq!(reward.critical_stage, Some(GrowthStage::Flowering));
        assert!((reward.total - 0.9 * 0.4 * 1.5).abs() < 1e-12);
    }

    #[test]
    fn composite_stays_within_documented_bounds() {
        let calc = RewardCalculator::default();
        for wsf_step in 0..=10 {
            for amount_step in 0..=10 {
                for stage in [0.1, 0.5, 0.7, 0.95] {
                    for (swc, delta) in [(0.1, -20_000.0), (0.5, 20_000.0), (0.3, 0.0)] {
                        let wsf = f64::from(wsf_step) / 10.0;
                        let amount = f64::from(amount_step) * 5.0;
                        let prev = fields(stage, wsf, swc, 10_000.0);
                        let curr = fields(stage, wsf, swc, 10_000.0 + delta);
                        let total = calc.calculate(&prev, &curr, amount, 0).total;
                        assert!((-1.5..=1.5).contains(&total), "{wsf} {amount} {stage} -> {total}");
                    }
                }
            }
        }
    }

    #[test]
    fn alternative_modes_guard_zero_amount() {
        let prev = fields(0.2, 0.4, 0.3, 0.0);
        let curr = fields(0.2, 0.4, 0.3, 2_000.0);
        let config = RewardConfig::default();
        let simple = RewardCalculator::new(config.clone().with_mode(RewardMode::Simple));
        assert!((simple.calculate(&prev, &curr, 10.0, 0).total - 0.4).abs() < 1e-12);
        let biomass = RewardCalculator::new(config.clone().with_mode(RewardMode::Biomass));
        assert!((biomass.calculate(&prev, &curr, 10.0, 0).total - 0.9).abs() < 1e-12);
        let efficiency = RewardCalculator::new(config.with_mode(RewardMode::YieldEfficiency));
        assert!((efficiency.calculate(&prev, &curr, 0.0, 0).total - 0.1).abs() < 1e-12);
        assert!((efficiency.calculate(&prev, &curr, 20.0, 0).total - 0.005).abs() < 1e-12);
        assert!(efficiency.calculate(&prev, &curr, 0.0, 0).weights.is_none());
    }

    #[test]
    fn dynamic_weights_follow_stage_bands() {
        let bands = DynamicBands::default();
        assert_eq!(bands.weights_for(0.1), StageWeights::new(0.2, 0.2, 0.4, 0.2));
        assert_eq!(bands.weights_for(0.6), StageWeights::new(0.6, 0.3, 0.1, 0.0));
        assert_eq!(bands.weights_for(0.9), StageWeights::new(0.1, 0.1, 0.1, 0.7));
        let mid = bands.weights_for(0.4);
        assert!((mid.crop_health - 0.4).abs() < 1e-12);
        assert!((mid.water_use_efficiency - 0.25).abs() < 1e-12);

        let held = DynamicBands {
            transition: InterpolationPolicy::HoldEarly,
            ..DynamicBands::default()
        };
        assert_eq!(held.weights_for(0.4), held.early);
    }

    #[test]
    fn mode_parses_cli_spellings() {
        assert_eq!("dynamic-stage".parse::<RewardMode>().unwrap(), RewardMode::DynamicStage);
        assert_eq!(" Composite ".parse::<RewardMode>().unwrap(), RewardMode::Composite);
        assert!("fancy".parse::<RewardMode>().is_err());
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let config = RewardConfig {
            optimal_swc: 1.4,
            ..RewardConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::RangeViolation { .. })));
        assert!(RewardConfig::default().validate().is_ok());
    }
}
