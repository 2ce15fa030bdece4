//! Error taxonomy for the irrigation environment.
use std::io;

use thiserror::Error;

use crate::episode::EpisodeState;

/// Top-level error returned by [`crate::IrrigationEnv`] operations.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("data acquisition error: {0}")]
    DataAcquisition(#[from] DataAcquisitionError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("{operation} is not allowed while the episode is {state}")]
    InvalidState {
        operation: &'static str,
        state: EpisodeState,
    },
}

/// Errors raised when episode configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} bounds invalid (min {min:.2} > max {max:.2})")]
    InvertedRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("date range invalid: start {start} is after end {end}")]
    DateRange { start: String, end: String },
    #[error("planting date {planting} falls outside the date range {start}..={end}")]
    PlantingOutsideRange {
        planting: String,
        start: String,
        end: String,
    },
    #[error("unknown cultivar {cultivar} for crop {crop}")]
    UnknownCultivar { crop: String, cultivar: String },
    #[error("{field} is required for {context}")]
    Missing {
        field: &'static str,
        context: &'static str,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Failures from the weather/soil collaborators that prevent an episode from starting.
#[derive(Debug, Error)]
pub enum DataAcquisitionError {
    #[error("no input source registered for {mode} mode")]
    SourceUnavailable { mode: &'static str },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("weather series covers {available} days but the season needs {required}")]
    InsufficientWeather { available: usize, required: usize },
    #[error("soil profile {soil_id} has no layers")]
    EmptySoilProfile { soil_id: String },
    #[error("{0}")]
    Other(String),
}

/// Failures reported by the simulation gateway.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("simulator reported an error: {detail}")]
    Failed { detail: String },
    #[error("simulator exceeded its {limit_ms} ms timeout (ran {elapsed_ms} ms)")]
    Timeout { limit_ms: u64, elapsed_ms: u64 },
    #[error("simulator workspace I/O failed: {0}")]
    Io(String),
    #[error("simulator returned no row for day {day}")]
    MissingRows { day: u32 },
}

impl SimulationError {
    /// Short stable label used in logs and episode summaries.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "failed",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
            Self::MissingRows { .. } => "missing_rows",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message_names_operation_and_state() {
        let err = EnvError::InvalidState {
            operation: "step",
            state: EpisodeState::Uninitialized,
        };
        assert_eq!(
            err.to_string(),
            "step is not allowed while the episode is uninitialized"
        );
    }

    #[test]
    fn nested_errors_convert_into_env_error() {
        let err: EnvError = SimulationError::Timeout {
            limit_ms: 50,
            elapsed_ms: 80,
        }
        .into();
        assert!(matches!(err, EnvError::Simulation(_)));
        assert!(err.to_string().contains("50 ms timeout"));
    }
}
