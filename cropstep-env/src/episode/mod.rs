//! Episode controller: owns the plan, history and day pointer, and drives the gateway.
mod log;

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use self::log::{EpisodeLog, LogRow};

use crate::action::{ActionDecision, ActionProcessor};
use crate::config::{DataSourceMode, EpisodeConfig};
use crate::error::{DataAcquisitionError, EnvError, SimulationError};
use crate::extract::{OutputExtractor, RawFields, SentinelSet};
use crate::gateway::{DailyResultRow, SimulationGateway, SimulationRequest, Workspace};
use crate::history::IrrigationHistory;
use crate::inputs::{GeneratedSource, InputRequest, InputSource, LocalSource, StaticInputs};
use crate::normalize::{Observation, normalize};
use crate::plan::{ManagementPlan, SeasonSetup};
use crate::reward::{RewardBreakdown, RewardCalculator};
use crate::sim::ReferenceSimulator;

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeState {
    #[default]
    Uninitialized,
    Ready,
    Stepping,
    Done,
}

impl EpisodeState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Stepping => "stepping",
            Self::Done => "done",
        }
    }

    #[must_use]
    pub const fn accepts_steps(self) -> bool {
        matches!(self, Self::Ready | Self::Stepping)
    }
}

impl fmt::Display for EpisodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The day pointer reached the configured season length.
    SeasonLength,
    /// The crop reached the maturity threshold.
    Maturity,
    /// The simulator output ended before the requested day.
    SeasonExhausted,
    /// The simulator failed or timed out.
    SimulationFailed,
}

impl TerminationReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SeasonLength => "season_length",
            Self::Maturity => "maturity",
            Self::SeasonExhausted => "season_exhausted",
            Self::SimulationFailed => "simulation_failed",
        }
    }
}

/// Diagnostics returned with every observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Day pointer after the call.
    pub day: u32,
    /// Unnormalized fields behind the observation.
    pub raw: RawFields,
    /// Fields replaced by sentinels during extraction.
    pub sentinel_fields: SentinelSet,
    /// True when the simulator output ended before `day` and its last row was used.
    pub row_fallback: bool,
    pub action: Option<ActionDecision>,
    pub reward: Option<RewardBreakdown>,
    pub termination: Option<TerminationReason>,
    pub error_detail: Option<String>,
    pub simulator_ms: u64,
}

impl StepInfo {
    fn extracted(day: u32, raw: RawFields, sentinel_fields: SentinelSet, row_fallback: bool) -> Self {
        Self {
            day,
            raw,
            sentinel_fields,
            row_fallback,
            action: None,
            reward: None,
            termination: None,
            error_detail: None,
            simulator_ms: 0,
        }
    }
}

/// Result of `reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub observation: Observation,
    pub info: StepInfo,
}

/// Result of `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// State owned by one episode; replaced wholesale on reset.
#[derive(Debug)]
struct Episode {
    number: u64,
    config: EpisodeConfig,
    inputs: StaticInputs,
    workspace: Workspace,
    plan: ManagementPlan,
    history: IrrigationHistory,
    extractor: OutputExtractor,
    processor: ActionProcessor,
    calculator: RewardCalculator,
    day: u32,
    prev_raw: RawFields,
    observation: Observation,
    total_reward: f64,
    log: EpisodeLog,
}

impl Episode {
    fn timeout(&self) -> Option<Duration> {
        self.config.simulator_timeout_ms.map(Duration::from_millis)
    }

    fn finish(&self, reason: TerminationReason) {
        ::log::info!(
            "episode {} ended on day {} ({}): reward {:.3}, irrigation {:.1} mm in {} events",
            self.number,
            self.day,
            reason.label(),
            self.total_reward,
            self.plan.total_mm(),
            self.plan.len()
        );
        if let Some(dir) = &self.config.log_dir {
            match self.log.write_csv(dir, self.number) {
                Ok(path) => ::log::info!("saved {} logged steps to {}", self.log.len(), path.display()),
                Err(e) => ::log::warn!("could not write episode log to {}: {e}", dir.display()),
            }
        }
    }
}

/// Step-wise irrigation environment over a full-season simulator.
///
/// Every `step` appends at most one irrigation event to the plan and re-runs the whole
/// season through the gateway, observing only the day just reached.
pub struct IrrigationEnv<G: SimulationGateway = ReferenceSimulator> {
    gateway: G,
    download_source: Option<Box<dyn InputSource>>,
    state: EpisodeState,
    episode: Option<Episode>,
    episodes_started: u64,
}

impl Default for IrrigationEnv<ReferenceSimulator> {
    fn default() -> Self {
        Self::new(ReferenceSimulator::new())
    }
}

impl<G: SimulationGateway> fmt::Debug for IrrigationEnv<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrrigationEnv")
            .field("gateway", &self.gateway.name())
            .field("state", &self.state)
            .field("day", &self.day())
            .field("episodes_started", &self.episodes_started)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run the gateway once and enforce the timeout around the call.
fn run_season<G: SimulationGateway>(
    gateway: &mut G,
    episode: &Episode,
) -> (Result<Vec<DailyResultRow>, SimulationError>, u64) {
    let timeout = episode.timeout();
    let request = SimulationRequest {
        plan: &episode.plan,
        inputs: &episode.inputs,
        workspace: &episode.workspace,
        timeout,
    };
    let started = Instant::now();
    let result = gateway.run(&request);
    let elapsed = elapsed_ms(started);
    let result = result.and_then(|output| {
        if let Some(limit) = timeout
            && elapsed > u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
        {
            return Err(SimulationError::Timeout {
                limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                elapsed_ms: elapsed,
            });
        }
        output.into_rows()
    });
    (result, elapsed)
}

impl<G: SimulationGateway> IrrigationEnv<G> {
    #[must_use]
    pub const fn new(gateway: G) -> Self {
        Self {
            gateway,
            download_source: None,
            state: EpisodeState::Uninitialized,
            episode: None,
            episodes_started: 0,
        }
    }

    /// Register the source that serves [`DataSourceMode::Download`] configurations.
    #[must_use]
    pub fn with_download_source(mut self, source: Box<dyn InputSource>) -> Self {
        self.download_source = Some(source);
        self
    }

    #[must_use]
    pub const fn state(&self) -> EpisodeState {
        self.state
    }

    /// Current day pointer, if an episode exists.
    #[must_use]
    pub fn day(&self) -> Option<u32> {
        self.episode.as_ref().map(|episode| episode.day)
    }

    #[must_use]
    pub fn plan(&self) -> Option<&ManagementPlan> {
        self.episode.as_ref().map(|episode| &episode.plan)
    }

    #[must_use]
    pub fn history(&self) -> Option<&IrrigationHistory> {
        self.episode.as_ref().map(|episode| &episode.history)
    }

    #[must_use]
    pub fn config(&self) -> Option<&EpisodeConfig> {
        self.episode.as_ref().map(|episode| &episode.config)
    }

    #[must_use]
    pub fn inputs(&self) -> Option<&StaticInputs> {
        self.episode.as_ref().map(|episode| &episode.inputs)
    }

    #[must_use]
    pub fn workspace(&self) -> Option<&Workspace> {
        self.episode.as_ref().map(|episode| &episode.workspace)
    }

    #[must_use]
    pub fn log(&self) -> Option<&EpisodeLog> {
        self.episode.as_ref().map(|episode| &episode.log)
    }

    /// Latest observation, if an episode exists.
    #[must_use]
    pub fn observation(&self) -> Option<&Observation> {
        self.episode.as_ref().map(|episode| &episode.observation)
    }

    /// Sum of rewards in the current episode.
    #[must_use]
    pub fn total_reward(&self) -> f64 {
        self.episode.as_ref().map_or(0.0, |episode| episode.total_reward)
    }

    #[must_use]
    pub const fn episodes_started(&self) -> u64 {
        self.episodes_started
    }

    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    pub const fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    fn acquire_inputs(&self, config: &EpisodeConfig) -> Result<StaticInputs, EnvError> {
        let cultivar = config.resolve_cultivar()?;
        let request = InputRequest::from_config(config);
        let inputs = match config.data_source {
            DataSourceMode::Generated => {
                StaticInputs::acquire(&GeneratedSource::default(), &request, cultivar)?
            }
            DataSourceMode::Local => {
                let dir = config.local_data_dir.clone().unwrap_or_else(PathBuf::new);
                StaticInputs::acquire(&LocalSource::new(dir), &request, cultivar)?
            }
            DataSourceMode::Download => {
                let source = self.download_source.as_deref().ok_or(
                    DataAcquisitionError::SourceUnavailable {
                        mode: DataSourceMode::Download.label(),
                    },
                )?;
                StaticInputs::acquire(source, &request, cultivar)?
            }
        };
        Ok(inputs)
    }

    /// Start a new episode: validate `config`, load inputs, run the baseline season with no
    /// irrigation and observe day 0.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Configuration`], [`EnvError::DataAcquisition`] or
    /// [`EnvError::Simulation`]; the controller is left uninitialized.
    pub fn reset(&mut self, config: EpisodeConfig) -> Result<ResetOutcome, EnvError> {
        self.state = EpisodeState::Uninitialized;
        self.episode = None;
        config.validate()?;
        let inputs = self.acquire_inputs(&config)?;

        self.episodes_started += 1;
        let number = self.episodes_started;
        let scenario_key = format!(
            "{}|{}|{}|{}",
            config.location.key(),
            config.planting_date,
            config.cultivar,
            config.seed
        );
        let workspace = Workspace::for_episode(&config.workspace_dir, &scenario_key, number);
        let plan = ManagementPlan::new(SeasonSetup {
            planting_date: config.planting_date,
            field_id: config.field_id.clone(),
            crop: config.crop.to_string(),
            cultivar: config.cultivar.clone(),
            soil_id: inputs.soil.soil_id.clone(),
            window_days: config.season_length,
        });
        let extractor = OutputExtractor::new(&inputs.soil);
        let mut episode = Episode {
            number,
            processor: ActionProcessor::new(config.action.clone()),
            calculator: RewardCalculator::new(config.reward.clone()),
            config,
            inputs,
            workspace,
            plan,
            history: IrrigationHistory::new(),
            extractor,
            day: 0,
            prev_raw: RawFields::sentinels(),
            observation: Observation::zeros(),
            total_reward: 0.0,
            log: EpisodeLog::new(),
        };

        let (rows, simulator_ms) = run_season(&mut self.gateway, &episode);
        let rows = rows.inspect_err(|e| {
            ::log::warn!("baseline simulation for episode {number} failed: {e}");
        })?;
        let extraction = episode.extractor.extract(&rows, 0, &episode.history)?;
        episode.prev_raw = extraction.raw;
        episode.observation = normalize(&extraction.raw);
        episode.log.push_initial(extraction.raw);

        ::log::info!(
            "episode {number} ready: {} at {} planted {}, {} day cap, {} reward via {}",
            episode.config.crop,
            episode.config.location,
            episode.config.planting_date,
            episode.config.season_length,
            episode.config.reward.mode,
            self.gateway.name()
        );

        let mut info = StepInfo::extracted(
            0,
            extraction.raw,
            extraction.sentinel_fields,
            extraction.row_fallback,
        );
        info.simulator_ms = simulator_ms;
        let outcome = ResetOutcome {
            observation: episode.observation,
            info,
        };
        self.episode = Some(episode);
        self.state = EpisodeState::Ready;
        Ok(outcome)
    }

    /// Apply one irrigation decision for the current day and advance to the next day.
    ///
    /// Simulator failures end the episode with the configured failure reward rather than
    /// returning an error; the day pointer is not advanced in that case.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidState`] when no episode is ready or the episode is done.
    pub fn step(&mut self, raw_action_mm: f64) -> Result<StepOutcome, EnvError> {
        let invalid = EnvError::InvalidState {
            operation: "step",
            state: self.state,
        };
        if !self.state.accepts_steps() {
            return Err(invalid);
        }
        let Some(episode) = self.episode.as_mut() else {
            return Err(invalid);
        };

        let day = episode.day;
        let mut decision = episode.processor.process(raw_action_mm, day, episode.plan.events());
        if let Some(violation) = decision.violation {
            ::log::warn!(
                "day {day}: {:.1} mm coerced to 0 by {}",
                decision.clipped_mm,
                violation.label()
            );
        }
        if decision.is_irrigation()
            && let Err(rejection) = episode.plan.append(day, decision.accepted_mm)
        {
            ::log::warn!("day {day}: plan rejected {:.1} mm ({rejection:?})", decision.accepted_mm);
            decision.accepted_mm = 0.0;
        }

        let (rows, simulator_ms) = run_season(&mut self.gateway, episode);
        let extraction = rows.and_then(|rows| {
            let mut history = episode.history.clone();
            history.record(day, decision.accepted_mm);
            let extraction = episode.extractor.extract(&rows, day + 1, &history)?;
            Ok((extraction, history))
        });

        let (extraction, history) = match extraction {
            Ok(ok) => ok,
            Err(e) => {
                ::log::warn!("episode {} day {day}: {} ({})", episode.number, e, e.kind());
                let reward = episode.config.reward.failure_reward;
                episode.total_reward += reward;
                self.state = EpisodeState::Done;
                episode.finish(TerminationReason::SimulationFailed);
                let mut info = StepInfo::extracted(day, episode.prev_raw, SentinelSet::new(), false);
                info.action = Some(decision);
                info.termination = Some(TerminationReason::SimulationFailed);
                info.error_detail = Some(e.to_string());
                info.simulator_ms = simulator_ms;
                return Ok(StepOutcome {
                    observation: episode.observation,
                    reward,
                    done: true,
                    info,
                });
            }
        };

        let next_day = day + 1;
        let raw = extraction.raw;
        let breakdown =
            episode
                .calculator
                .calculate(&episode.prev_raw, &raw, decision.accepted_mm, next_day);
        let termination = if extraction.row_fallback {
            Some(TerminationReason::SeasonExhausted)
        } else if raw.phenological_stage() >= episode.config.maturity_threshold {
            Some(TerminationReason::Maturity)
        } else if next_day >= episode.config.season_length {
            Some(TerminationReason::SeasonLength)
        } else {
            None
        };

        episode.day = next_day;
        episode.history = history;
        episode.prev_raw = raw;
        episode.observation = normalize(&raw);
        episode.total_reward += breakdown.total;
        episode.log.push(LogRow {
            day: next_day,
            raw,
            action_mm: raw_action_mm,
            accepted_mm: decision.accepted_mm,
            reward: breakdown.total,
        });
        ::log::debug!(
            "day {day} ({}) -> {next_day}: accepted {:.1} mm, reward {:.4}, stage {:.3}",
            episode.plan.setup().date_of(day),
            decision.accepted_mm,
            breakdown.total,
            raw.phenological_stage()
        );

        self.state = if termination.is_some() {
            EpisodeState::Done
        } else {
            EpisodeState::Stepping
        };
        if let Some(reason) = termination {
            episode.finish(reason);
        }

        let mut info = StepInfo::extracted(
            next_day,
            raw,
            extraction.sentinel_fields,
            extraction.row_fallback,
        );
        info.action = Some(decision);
        info.reward = Some(breakdown);
        info.termination = termination;
        info.simulator_ms = simulator_ms;
        Ok(StepOutcome {
            observation: episode.observation,
            reward: breakdown.total,
            done: termination.is_some(),
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObservationField;

    fn config(tag: &str) -> EpisodeConfig {
        EpisodeConfig {
            workspace_dir: std::env::temp_dir().join(format!("cropstep-env-{tag}")),
            ..EpisodeConfig::generated(12.5, 78.2, 5).with_season_length(30)
        }
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let mut env = IrrigationEnv::default();
        let err = env.step(10.0).unwrap_err();
        assert!(matches!(
            err,
            EnvError::InvalidState {
                operation: "step",
                state: EpisodeState::Uninitialized
            }
        ));
        assert_eq!(env.state(), EpisodeState::Uninitialized);
    }

    #[test]
    fn reset_observes_day_zero() {
        let mut env = IrrigationEnv::default();
        let outcome = env.reset(config("reset")).unwrap();
        assert_eq!(env.state(), EpisodeState::Ready);
        assert_eq!(env.day(), Some(0));
        assert_eq!(outcome.info.day, 0);
        assert!(outcome.info.action.is_none());
        assert!(outcome.observation.get(ObservationField::DaysAfterPlanting).abs() < f64::EPSILON);
        assert!(env.plan().unwrap().is_empty());
        assert_eq!(env.log().unwrap().len(), 1);
    }

    #[test]
    fn accepted_irrigation_is_appended_and_recorded() {
        let mut env = IrrigationEnv::default();
        env.reset(config("append")).unwrap();
        let outcome = env.step(80.0).unwrap();
        assert_eq!(env.state(), EpisodeState::Stepping);
        assert_eq!(env.day(), Some(1));
        let decision = outcome.info.action.unwrap();
        assert!((decision.accepted_mm - 50.0).abs() < f64::EPSILON);
        assert_eq!(env.plan().unwrap().events()[0].day_offset, 0);
        assert!((outcome.info.raw.get(ObservationField::LastAmount) - 50.0).abs() < f64::EPSILON);

        let outcome = env.step(30.0).unwrap();
        assert!(outcome.info.action.unwrap().violation.is_some());
        assert_eq!(env.plan().unwrap().len(), 1);
        assert!(outcome.info.raw.get(ObservationField::LastAmount).abs() < f64::EPSILON);
        assert!((outcome.info.raw.get(ObservationField::AmountT1) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn download_mode_without_source_cannot_start() {
        let mut env = IrrigationEnv::default();
        let config = EpisodeConfig {
            data_source: DataSourceMode::Download,
            ..config("download")
        };
        let err = env.reset(config).unwrap_err();
        assert!(matches!(
            err,
            EnvError::DataAcquisition(DataAcquisitionError::SourceUnavailable { mode: "download" })
        ));
        assert_eq!(env.state(), EpisodeState::Uninitialized);
    }

    #[test]
    fn download_mode_uses_registered_source() {
        let mut env = IrrigationEnv::default().with_download_source(Box::new(GeneratedSource::default()));
        let config = EpisodeConfig {
            data_source: DataSourceMode::Download,
            ..config("download-ok")
        };
        assert!(env.reset(config).is_ok());
    }

    #[test]
    fn invalid_config_is_reported_at_reset() {
        let mut env = IrrigationEnv::default();
        let err = env.reset(config("bad").with_season_length(500)).unwrap_err();
        assert!(matches!(err, EnvError::Configuration(_)));
    }
}
