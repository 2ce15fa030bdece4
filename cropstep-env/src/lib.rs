//! Cropstep Environment
//!
//! Step-wise irrigation decision environment for reinforcement-learning agents. Each step
//! takes one irrigation amount, re-runs a full-season crop simulation with the updated
//! schedule, and returns a normalized 28-field observation with a shaped reward.
//! Simulators plug in through [`SimulationGateway`]; weather and soil through [`InputSource`].

pub mod action;
pub mod config;
pub mod episode;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod history;
pub mod inputs;
pub mod normalize;
pub mod numbers;
pub mod plan;
pub mod reward;
pub mod scenario;
pub mod schema;
pub mod seed;
pub mod sim;

// Re-export commonly used types
pub use action::{ActionDecision, ActionLimits, ActionProcessor, ConstraintViolation};
pub use config::{DataSourceMode, EpisodeConfig, Location, MAX_SEASON_DAYS};
pub use episode::{
    EpisodeLog, EpisodeState, IrrigationEnv, LogRow, ResetOutcome, StepInfo, StepOutcome,
    TerminationReason,
};
pub use error::{ConfigError, DataAcquisitionError, EnvError, SimulationError};
pub use extract::{Extraction, OutputExtractor, RawFields, SentinelSet};
pub use gateway::{
    DailyResultRow, MISSING_VALUE, ProcessGateway, RunStatus, SimulationGateway,
    SimulationOutput, SimulationRequest, Workspace,
};
pub use history::{HISTORY_SLOTS, IrrigationHistory};
pub use inputs::{
    Crop, Cultivar, GeneratedSource, InputRequest, InputSource, LocalSource, SoilLayer,
    SoilProfile, StaticInputs, WeatherDay, WeatherSeries,
};
pub use normalize::{Observation, denormalize, normalize};
pub use plan::{IrrigationEvent, ManagementPlan, PlanRejection, SeasonSetup};
pub use reward::{
    DynamicBands, GrowthStage, InterpolationPolicy, RewardBreakdown, RewardCalculator,
    RewardConfig, RewardMode, StageWeights, StageWindow,
};
pub use scenario::{ScenarioRanges, ScenarioSampler};
pub use schema::{FIELD_SCHEMA, FieldGroup, FieldSpec, OBSERVATION_DIM, ObservationField};
pub use seed::{derive_stream_seed, seed_from_label, stream_rng};
pub use sim::ReferenceSimulator;
