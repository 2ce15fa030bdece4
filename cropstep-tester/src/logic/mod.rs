pub mod determinism;
pub mod policy;
pub mod ranges;
pub mod reports;
pub mod runner;

pub use determinism::{DeterminismReport, check_determinism};
pub use policy::{IrrigationStrategy, parse_strategies};
pub use ranges::scan_logs;
pub use runner::{EpisodeRecord, PolicySummary, RolloutPlan, run_rollouts, summarize};
