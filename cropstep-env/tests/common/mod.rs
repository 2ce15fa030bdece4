#![allow(dead_code)]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use cropstep_env::extract::columns;
use cropstep_env::{
    DailyResultRow, EpisodeConfig, SimulationError, SimulationGateway, SimulationOutput,
    SimulationRequest,
};

/// Gateway that produces simple closed-form rows and can be told to misbehave.
#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    /// Day on which the scripted crop reaches maturity.
    pub maturity_day: u32,
    /// Truncate output to this many rows.
    pub max_rows: Option<usize>,
    /// 1-based call number that reports `ERROR`.
    pub fail_on_call: Option<usize>,
    /// 1-based call number that sleeps before answering.
    pub slow_on_call: Option<(usize, Duration)>,
    pub calls: usize,
}

impl ScriptedGateway {
    pub const fn new(maturity_day: u32) -> Self {
        Self {
            maturity_day,
            max_rows: None,
            fail_on_call: None,
            slow_on_call: None,
            calls: 0,
        }
    }

    pub const fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub const fn truncated(mut self, rows: usize) -> Self {
        self.max_rows = Some(rows);
        self
    }

    pub const fn slow_on(mut self, call: usize, delay: Duration) -> Self {
        self.slow_on_call = Some((call, delay));
        self
    }
}

impl SimulationGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    fn run(&mut self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, SimulationError> {
        self.calls += 1;
        if let Some((call, delay)) = self.slow_on_call
            && call == self.calls
        {
            thread::sleep(delay);
        }
        if self.fail_on_call == Some(self.calls) {
            return Ok(SimulationOutput::error("scripted failure"));
        }

        let window = request.plan.setup().window_days;
        let mut rows = Vec::new();
        let mut irrigated = 0.0;
        for das in 0..=window {
            let stage = (f64::from(das) / f64::from(self.maturity_day)).min(1.0);
            let mut row = DailyResultRow::new(das);
            row.insert(columns::DAS, f64::from(das));
            row.insert(columns::STAGE, stage);
            row.insert(columns::LAI, 4.0 * stage);
            row.insert(columns::BIOMASS, 60.0 * f64::from(das) + 5.0 * irrigated);
            row.insert(columns::GDD, 15.0 * f64::from(das));
            for layer in 1..=6 {
                row.insert(&columns::soil_water(layer), 0.15 + irrigated / 2_000.0);
            }
            row.insert(columns::AVAILABLE_WATER, 0.5);
            row.insert(columns::WATER_STRESS, 0.1);
            row.insert(columns::RAIN, if das % 9 == 0 { 12.0 } else { 0.0 });
            row.insert(columns::TMIN, 21.0);
            row.insert(columns::TMAX, 33.0);
            row.insert(columns::SRAD, 19.0);
            row.insert(columns::ET0, 5.5);
            rows.push(row);
            if stage >= 1.0 {
                break;
            }
            irrigated += request
                .plan
                .events()
                .iter()
                .filter(|event| event.day_offset == das)
                .map(|event| event.amount_mm)
                .sum::<f64>();
        }
        if let Some(limit) = self.max_rows {
            rows.truncate(limit);
        }
        Ok(SimulationOutput::ok(rows))
    }
}

pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cropstep-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn config(tag: &str, season_length: u32) -> EpisodeConfig {
    EpisodeConfig {
        workspace_dir: temp_dir(tag).join("workspace"),
        ..EpisodeConfig::generated(12.38, 78.93, 11).with_season_length(season_length)
    }
}
