//! In-process reference simulator: a daily soil-water and crop-growth model.
//!
//! The model is deliberately compact: a layered tipping-bucket soil with curve-number
//! runoff, Hargreaves-Samani reference ET split into soil evaporation and transpiration by
//! canopy cover, thermal-time phenology, and radiation-use-efficiency biomass growth
//! limited by water supply. Output stops on the day the crop reaches maturity.
mod crop;
mod et;
mod water;

use chrono::Datelike;

pub use crop::CropGrowth;
pub use et::{extraterrestrial_radiation, hargreaves_et0};
pub use water::{SoilWater, runoff};

use crate::error::SimulationError;
use crate::extract::columns;
use crate::gateway::{DailyResultRow, SimulationGateway, SimulationOutput, SimulationRequest};
use crate::inputs::StaticInputs;
use crate::plan::ManagementPlan;

/// Cumulative irrigation applied before the row's day, mm.
pub const CUMULATIVE_IRRIGATION: &str = "IRRC";
/// Cumulative deep drainage, mm.
pub const CUMULATIVE_DRAINAGE: &str = "DRNC";
/// Cumulative surface runoff, mm.
pub const CUMULATIVE_RUNOFF: &str = "ROFC";
/// Root depth, cm.
pub const ROOT_DEPTH: &str = "RDPD";

/// Deterministic gateway backed by the in-process model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceSimulator;

impl ReferenceSimulator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Simulate the full season. Structurally invalid plans produce an `ERROR` run.
    #[must_use]
    pub fn simulate(plan: &ManagementPlan, inputs: &StaticInputs) -> SimulationOutput {
        let setup = plan.setup();
        if let Some(event) = plan
            .events()
            .iter()
            .find(|event| event.day_offset > setup.window_days)
        {
            return SimulationOutput::error(format!(
                "irrigation on day {} is outside the {}-day window",
                event.day_offset, setup.window_days
            ));
        }
        if let Some(event) = plan
            .events()
            .iter()
            .find(|event| !(event.amount_mm.is_finite() && event.amount_mm > 0.0))
        {
            return SimulationOutput::error(format!(
                "irrigation on day {} has invalid amount {}",
                event.day_offset, event.amount_mm
            ));
        }
        let Ok(days) = usize::try_from(setup.window_days).map(|window| window + 1) else {
            return SimulationOutput::error("simulation window too long");
        };
        let Some(weather) = inputs.weather.window(setup.planting_date, days) else {
            return SimulationOutput::error(format!(
                "weather for {} does not cover {} days from {}",
                inputs.weather.station, days, setup.planting_date
            ));
        };

        let soil = &inputs.soil;
        let mut water = SoilWater::new(soil);
        let mut crop = CropGrowth::new(inputs.cultivar.clone(), soil.depth_cm());
        let layer_columns: Vec<String> = (1..=soil.layers.len()).map(columns::soil_water).collect();
        let mut events = plan.events().iter().peekable();
        let mut irrigation_total = 0.0;
        let mut drainage_total = 0.0;
        let mut runoff_total = 0.0;
        let mut rows = Vec::with_capacity(days);

        for (das, day) in (0_u32..).zip(weather) {
            let et0 = hargreaves_et0(
                day.tmin,
                day.tmax,
                extraterrestrial_radiation(inputs.weather.latitude, day.date.ordinal()),
            );

            let mut row = DailyResultRow::new(das);
            row.insert(columns::DAS, f64::from(das));
            row.insert(columns::STAGE, crop.stage());
            row.insert(columns::LAI, crop.lai());
            row.insert(columns::BIOMASS, crop.biomass_kg_ha());
            row.insert(columns::GDD, crop.cumulative_gdd());
            for (name, theta) in layer_columns.iter().zip(water.contents()) {
                row.insert(name, theta);
            }
            row.insert(columns::AVAILABLE_WATER, water.available_fraction(crop.root_depth_cm()));
            row.insert(columns::WATER_STRESS, crop.water_stress());
            row.insert(columns::RAIN, day.rain);
            row.insert(columns::TMIN, day.tmin);
            row.insert(columns::TMAX, day.tmax);
            row.insert(columns::TAVG, day.tavg());
            row.insert(columns::SRAD, day.srad);
            row.insert(columns::ET0, et0);
            row.insert(CUMULATIVE_IRRIGATION, irrigation_total);
            row.insert(CUMULATIVE_DRAINAGE, drainage_total);
            row.insert(CUMULATIVE_RUNOFF, runoff_total);
            row.insert(ROOT_DEPTH, crop.root_depth_cm());
            rows.push(row);

            if crop.is_mature() || das == setup.window_days {
                break;
            }

            let irrigation = match events.peek() {
                Some(event) if event.day_offset == das => {
                    let amount = event.amount_mm;
                    events.next();
                    amount
                }
                _ => 0.0,
            };
            irrigation_total += irrigation;
            let surface_runoff = runoff(day.rain, soil.runoff_curve);
            runoff_total += surface_runoff;
            drainage_total += water.infiltrate(day.rain - surface_runoff + irrigation);
            drainage_total += water.drain(soil.drainage_rate);

            let cover = crop.cover();
            water.evaporate(et0 * (1.0 - cover));
            let potential_transpiration = et0 * cover;
            let transpiration = water.uptake(potential_transpiration, crop.root_depth_cm());
            let supply_ratio = if potential_transpiration > 0.0 {
                transpiration / potential_transpiration
            } else {
                1.0
            };
            crop.advance(day.tavg(), day.srad, supply_ratio, soil.depth_cm());
        }

        log::trace!(
            "reference run: {} rows, {} events, {:.1} mm irrigation",
            rows.len(),
            plan.len(),
            irrigation_total
        );
        SimulationOutput::ok(rows)
    }
}

impl SimulationGateway for ReferenceSimulator {
    fn name(&self) -> &str {
        "reference"
    }

    fn run(&mut self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, SimulationError> {
        Ok(Self::simulate(request.plan, request.inputs))
    }
}
