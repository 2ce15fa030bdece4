//! Simulation gateway: one synchronous full-season run per call.
mod process;
mod workspace;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use process::{PLAN_FILE, ProcessGateway, ROWS_FILE, SimulationInputFile};
pub use workspace::Workspace;

use crate::error::SimulationError;
use crate::inputs::StaticInputs;
use crate::plan::ManagementPlan;

/// Values at or below this mark a missing measurement in simulator output.
pub const MISSING_VALUE: f64 = -99.0;

/// One simulated day of raw output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyResultRow {
    /// Days after planting.
    pub das: u32,
    pub columns: BTreeMap<String, f64>,
}

impl DailyResultRow {
    #[must_use]
    pub const fn new(das: u32) -> Self {
        Self {
            das,
            columns: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, column: &str, value: f64) {
        self.columns.insert(column.to_string(), value);
    }

    /// Column value, or `None` when absent, non-finite, or flagged missing.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .get(column)
            .copied()
            .filter(|value| value.is_finite() && *value > MISSING_VALUE)
    }
}

/// Outcome reported by the simulator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Ok,
    Error,
}

/// Per-day rows for the whole season plus the simulator's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub status: RunStatus,
    pub rows: Vec<DailyResultRow>,
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl SimulationOutput {
    #[must_use]
    pub const fn ok(rows: Vec<DailyResultRow>) -> Self {
        Self {
            status: RunStatus::Ok,
            rows,
            error_detail: None,
        }
    }

    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            rows: Vec::new(),
            error_detail: Some(detail.into()),
        }
    }

    /// Rows of a successful run.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Failed`] carrying the detail when the status is `ERROR`.
    pub fn into_rows(self) -> Result<Vec<DailyResultRow>, SimulationError> {
        match self.status {
            RunStatus::Ok => Ok(self.rows),
            RunStatus::Error => Err(SimulationError::Failed {
                detail: self
                    .error_detail
                    .unwrap_or_else(|| "simulator reported ERROR without detail".to_string()),
            }),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRequest<'a> {
    pub plan: &'a ManagementPlan,
    pub inputs: &'a StaticInputs,
    pub workspace: &'a Workspace,
    pub timeout: Option<Duration>,
}

/// Synchronous call into a full-season simulator.
pub trait SimulationGateway {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run the whole season described by `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`SimulationError`] when the run cannot complete (I/O, timeout). A run that
    /// completes but reports `ERROR` is returned as `Ok` with that status.
    fn run(&mut self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, SimulationError>;
}

impl<G: SimulationGateway + ?Sized> SimulationGateway for Box<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&mut self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, SimulationError> {
        (**self).run(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_markers_read_as_absent() {
        let mut row = DailyResultRow::new(3);
        row.insert("LAID", MISSING_VALUE);
        row.insert("CWAD", f64::NAN);
        row.insert("GSTD", 0.4);
        assert_eq!(row.get("LAID"), None);
        assert_eq!(row.get("CWAD"), None);
        assert_eq!(row.get("GSTD"), Some(0.4));
        assert_eq!(row.get("SRAD"), None);
    }

    #[test]
    fn error_status_converts_to_failure() {
        let output = SimulationOutput::error("irrigation event after harvest");
        assert_eq!(
            output.into_rows(),
            Err(SimulationError::Failed {
                detail: "irrigation event after harvest".to_string()
            })
        );
        assert_eq!(SimulationOutput::ok(Vec::new()).into_rows(), Ok(Vec::new()));
        let json = serde_json::to_string(&SimulationOutput::ok(Vec::new())).unwrap();
        assert!(json.contains("\"OK\""));
    }
}
