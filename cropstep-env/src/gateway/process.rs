use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{SimulationGateway, SimulationOutput, SimulationRequest};
use crate::error::SimulationError;
use crate::inputs::StaticInputs;
use crate::plan::ManagementPlan;

/// Input document written into the workspace before each run.
pub const PLAN_FILE: &str = "plan.json";
/// Output document the simulator command must write.
pub const ROWS_FILE: &str = "rows.json";
/// Captured stdout and stderr of the simulator command.
pub const LOG_FILE: &str = "simulator.log";

const LOG_TAIL_CHARS: usize = 400;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Contents of [`PLAN_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputFile {
    pub plan: ManagementPlan,
    pub inputs: StaticInputs,
}

/// Runs an external simulator command inside the episode workspace.
///
/// The command starts in the workspace directory, reads [`PLAN_FILE`], and writes a
/// [`SimulationOutput`] document to [`ROWS_FILE`]. A non-zero exit is reported as an
/// `ERROR` run; exceeding the request timeout kills the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGateway {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessGateway {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn write_input(dir: &Path, request: &SimulationRequest<'_>) -> Result<(), SimulationError> {
        let document = SimulationInputFile {
            plan: request.plan.clone(),
            inputs: request.inputs.clone(),
        };
        let json = serde_json::to_string(&document)
            .map_err(|e| SimulationError::Io(format!("encoding {PLAN_FILE}: {e}")))?;
        fs::write(dir.join(PLAN_FILE), json)
            .map_err(|e| SimulationError::Io(format!("writing {PLAN_FILE}: {e}")))?;
        match fs::remove_file(dir.join(ROWS_FILE)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SimulationError::Io(
                format!("clearing stale {ROWS_FILE}: {e}"),
            )),
            _ => Ok(()),
        }
    }

    fn log_tail(dir: &Path) -> String {
        let log = fs::read_to_string(dir.join(LOG_FILE)).unwrap_or_default();
        let trimmed = log.trim();
        let start = trimmed
            .char_indices()
            .rev()
            .nth(LOG_TAIL_CHARS)
            .map_or(0, |(idx, _)| idx);
        trimmed[start..].to_string()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl SimulationGateway for ProcessGateway {
    fn name(&self) -> &str {
        "process"
    }

    fn run(&mut self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, SimulationError> {
        let dir = request.workspace.ensure()?;
        Self::write_input(dir, request)?;

        let log = File::create(dir.join(LOG_FILE))
            .map_err(|e| SimulationError::Io(format!("creating {LOG_FILE}: {e}")))?;
        let log_err = log
            .try_clone()
            .map_err(|e| SimulationError::Io(format!("sharing {LOG_FILE}: {e}")))?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| {
                SimulationError::Io(format!("spawning {}: {e}", self.program.display()))
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(SimulationError::Io(format!("waiting for simulator: {e}"))),
            }
            if let Some(limit) = request.timeout {
                let elapsed = started.elapsed();
                if elapsed > limit {
                    if let Err(e) = child.kill() {
                        log::warn!("could not kill simulator {}: {e}", self.program.display());
                    }
                    if let Err(e) = child.wait() {
                        log::warn!("could not reap simulator {}: {e}", self.program.display());
                    }
                    log::warn!(
                        "simulator {} killed after {} ms",
                        self.program.display(),
                        millis(elapsed)
                    );
                    return Err(SimulationError::Timeout {
                        limit_ms: millis(limit),
                        elapsed_ms: millis(elapsed),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Ok(SimulationOutput::error(format!(
                "{} exited with {status}: {}",
                self.program.display(),
                Self::log_tail(dir)
            )));
        }
        let path = dir.join(ROWS_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|e| SimulationError::Io(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| SimulationError::Io(format!("decoding {}: {e}", path.display())))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::EpisodeConfig;
    use crate::gateway::{RunStatus, Workspace};
    use crate::inputs::{GeneratedSource, InputRequest};
    use crate::plan::SeasonSetup;

    fn fixture(tag: &str) -> (ManagementPlan, StaticInputs, Workspace) {
        let config = EpisodeConfig::default();
        let inputs = StaticInputs::acquire(
            &GeneratedSource::default(),
            &InputRequest::from_config(&config),
            config.resolve_cultivar().unwrap(),
        )
        .unwrap();
        let plan = ManagementPlan::new(SeasonSetup {
            planting_date: config.planting_date,
            field_id: config.field_id.clone(),
            crop: config.crop.to_string(),
            cultivar: config.cultivar.clone(),
            soil_id: config.soil_id(),
            window_days: config.season_length,
        });
        let root = std::env::temp_dir().join(format!("cropstep-proc-{tag}-{}", std::process::id()));
        let workspace = Workspace::for_episode(&root, tag, 1);
        (plan, inputs, workspace)
    }

    #[test]
    fn shell_command_output_is_read_back() {
        let (plan, inputs, workspace) = fixture("ok");
        let mut gateway = ProcessGateway::new("sh").with_args([
            "-c",
            r#"test -f plan.json && printf '{"status":"OK","rows":[{"das":0,"columns":{"GSTD":0.0}}]}' > rows.json"#,
        ]);
        let request = SimulationRequest {
            plan: &plan,
            inputs: &inputs,
            workspace: &workspace,
            timeout: Some(Duration::from_secs(10)),
        };
        let output = gateway.run(&request).unwrap();
        assert_eq!(output.status, RunStatus::Ok);
        assert_eq!(output.rows.len(), 1);
        workspace.clean().unwrap();
    }

    #[test]
    fn failing_command_reports_error_status() {
        let (plan, inputs, workspace) = fixture("fail");
        let mut gateway = ProcessGateway::new("sh").with_args(["-c", "echo bad soil file >&2; exit 3"]);
        let request = SimulationRequest {
            plan: &plan,
            inputs: &inputs,
            workspace: &workspace,
            timeout: None,
        };
        let output = gateway.run(&request).unwrap();
        assert_eq!(output.status, RunStatus::Error);
        assert!(output.error_detail.unwrap().contains("bad soil file"));
        workspace.clean().unwrap();
    }

    #[test]
    fn slow_command_times_out() {
        let (plan, inputs, workspace) = fixture("slow");
        let mut gateway =
            ProcessGateway::new("sh").with_args(["-c", "sleep 1 && touch finished.txt"]);
        let request = SimulationRequest {
            plan: &plan,
            inputs: &inputs,
            workspace: &workspace,
            timeout: Some(Duration::from_millis(100)),
        };
        let started = Instant::now();
        let err = gateway.run(&request).unwrap_err();
        assert!(matches!(err, SimulationError::Timeout { limit_ms: 100, .. }));
        assert!(started.elapsed() < Duration::from_millis(900));

        // The killed shell never reaches its second command.
        thread::sleep(Duration::from_millis(1_500));
        assert!(!workspace.path("finished.txt").exists());
        workspace.clean().unwrap();
    }
}
