use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use cropstep_env::seed::{POLICY_STREAM, stream_rng};
use cropstep_env::{ObservationField, RawFields};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

/// Irrigation decision interface for baseline rollouts.
pub trait IrrigationPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Irrigation amount in mm for the day described by `raw`.
    fn decide(&mut self, day: u32, raw: &RawFields) -> f64;
}

/// Built-in irrigation strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IrrigationStrategy {
    /// Never irrigate.
    Rainfed,
    /// Fixed amount on a fixed interval.
    FixedSchedule,
    /// Refill when plant-available water drops below a threshold.
    SoilThreshold,
    /// Seeded random amounts on random days.
    Random,
}

impl IrrigationStrategy {
    pub const ALL: [Self; 4] = [
        Self::Rainfed,
        Self::FixedSchedule,
        Self::SoilThreshold,
        Self::Random,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Rainfed => "none",
            Self::FixedSchedule => "fixed",
            Self::SoilThreshold => "threshold",
            Self::Random => "random",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rainfed => "Rainfed",
            Self::FixedSchedule => "Fixed Schedule",
            Self::SoilThreshold => "Soil Threshold",
            Self::Random => "Random",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Rainfed => "never irrigates",
            Self::FixedSchedule => "25 mm every 7 days",
            Self::SoilThreshold => "30 mm when available water falls below 50%",
            Self::Random => "5-50 mm on roughly one day in four",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn IrrigationPolicy> {
        match self {
            Self::Rainfed => Box::new(RainfedPolicy),
            Self::FixedSchedule => Box::new(FixedSchedulePolicy {
                interval_days: 7,
                amount_mm: 25.0,
            }),
            Self::SoilThreshold => Box::new(SoilThresholdPolicy {
                threshold: 0.5,
                amount_mm: 30.0,
            }),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for IrrigationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IrrigationStrategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase();
        match key.as_str() {
            "none" | "rainfed" => Ok(Self::Rainfed),
            "fixed" | "schedule" => Ok(Self::FixedSchedule),
            "threshold" | "soil" => Ok(Self::SoilThreshold),
            "random" => Ok(Self::Random),
            _ => bail!("unknown policy '{value}'"),
        }
    }
}

/// Parse a comma-separated policy list; `all` expands to every strategy.
///
/// # Errors
///
/// Returns an error naming the first unknown policy.
pub fn parse_strategies(tokens: &[String]) -> anyhow::Result<Vec<IrrigationStrategy>> {
    let mut strategies = Vec::new();
    for token in tokens {
        if token.eq_ignore_ascii_case("all") {
            for strategy in IrrigationStrategy::ALL {
                if !strategies.contains(&strategy) {
                    strategies.push(strategy);
                }
            }
            continue;
        }
        let strategy: IrrigationStrategy = token.parse()?;
        if !strategies.contains(&strategy) {
            strategies.push(strategy);
        }
    }
    Ok(strategies)
}

struct RainfedPolicy;

struct FixedSchedulePolicy {
    interval_days: u32,
    amount_mm: f64,
}

struct SoilThresholdPolicy {
    threshold: f64,
    amount_mm: f64,
}

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: stream_rng(seed, POLICY_STREAM),
        }
    }
}

impl IrrigationPolicy for RainfedPolicy {
    fn name(&self) -> &'static str {
        "Rainfed"
    }

    fn decide(&mut self, _day: u32, _raw: &RawFields) -> f64 {
        0.0
    }
}

impl IrrigationPolicy for FixedSchedulePolicy {
    fn name(&self) -> &'static str {
        "Fixed Schedule"
    }

    fn decide(&mut self, day: u32, _raw: &RawFields) -> f64 {
        if day % self.interval_days == 0 {
            self.amount_mm
        } else {
            0.0
        }
    }
}

impl IrrigationPolicy for SoilThresholdPolicy {
    fn name(&self) -> &'static str {
        "Soil Threshold"
    }

    fn decide(&mut self, _day: u32, raw: &RawFields) -> f64 {
        let available = raw.get(ObservationField::AvailableWaterFraction);
        let forecast = raw.get(ObservationField::ForecastRainNext);
        if available < self.threshold && forecast < self.amount_mm {
            self.amount_mm
        } else {
            0.0
        }
    }
}

impl IrrigationPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn decide(&mut self, _day: u32, _raw: &RawFields) -> f64 {
        if self.rng.gen_bool(0.25) {
            self.rng.gen_range(5.0..=50.0)
        } else {
            0.0
        }
    }
}
