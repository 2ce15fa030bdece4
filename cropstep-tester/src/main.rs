mod logic;
mod util;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use cropstep_env::gateway::{PLAN_FILE, ROWS_FILE, SimulationInputFile};
use cropstep_env::{
    EpisodeConfig, IrrigationEnv, ProcessGateway, ReferenceSimulator, RewardMode, ScenarioRanges,
    SimulationGateway,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use logic::{
    DeterminismReport, EpisodeRecord, IrrigationStrategy, PolicySummary, RolloutPlan,
    check_determinism, parse_strategies, run_rollouts, scan_logs, summarize,
};
use util::{parse_seeds, run_timestamp, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GatewayKind {
    /// In-process reference water-balance model
    Reference,
    /// External simulator command run in an isolated workspace per episode
    Process,
}

#[derive(Debug, Parser)]
#[command(name = "cropstep-tester", version)]
#[command(about = "Baseline irrigation policy rollouts, determinism checks and log analysis")]
struct Args {
    /// Policies to run (comma-separated, or "all")
    #[arg(long, default_value = "all")]
    policies: String,

    /// List all available policies and exit
    #[arg(long)]
    list_policies: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Episodes per policy and seed
    #[arg(long, default_value_t = 1)]
    episodes: usize,

    /// Override the season length cap in days
    #[arg(long)]
    season_length: Option<u32>,

    /// Override the reward mode (composite, simple, biomass, yield_efficiency, dynamic_stage)
    #[arg(long)]
    reward_mode: Option<String>,

    /// Episode configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Draw location and planting date per episode
    #[arg(long)]
    randomize: bool,

    /// Scenario ranges JSON file used with --randomize
    #[arg(long)]
    scenario_ranges: Option<PathBuf>,

    /// Simulator backend
    #[arg(long, value_enum, default_value_t = GatewayKind::Reference)]
    gateway: GatewayKind,

    /// Simulator command for the process gateway (defaults to this binary)
    #[arg(long)]
    simulator: Option<PathBuf>,

    /// Simulator timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Root directory for per-episode simulator workspaces
    #[arg(long, default_value = "target/cropstep-workspace")]
    workspace: PathBuf,

    /// Directory for per-episode CSV logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Replay every policy/seed pair twice and compare trajectories
    #[arg(long)]
    check_determinism: bool,

    /// Print min/max/mean of every column across the CSV logs in DIR and exit
    #[arg(long, value_name = "DIR")]
    ranges: Option<PathBuf>,

    /// Act as the simulator: read plan.json in DIR and write rows.json
    #[arg(long, value_name = "DIR", hide = true)]
    simulate_in: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(dir) = &args.simulate_in {
        return simulate_in(dir);
    }
    if maybe_list_policies(&args)? {
        return Ok(());
    }
    if let Some(dir) = &args.ranges {
        return write_range_report(&args, dir);
    }

    announce_banner();
    let start_time = Instant::now();
    let strategies = parse_strategies(&split_csv(&args.policies))?;
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    if strategies.is_empty() || seeds.is_empty() {
        bail!("at least one policy and one seed are required");
    }
    let base = build_base_config(&args)?;

    if args.check_determinism {
        let reports = run_determinism(&args, &base, &strategies, &seeds)?;
        let mut output_target = OutputTarget::new(args.output.clone())?;
        logic::reports::generate_determinism_report(output_target.writer(), &reports)?;
        output_target.flush_inner()?;
        if reports.iter().any(|report| !report.matches()) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let plan = RolloutPlan {
        strategies,
        seeds,
        episodes: args.episodes.max(1),
        base,
        randomize: load_scenario_ranges(&args)?,
        verbose: args.verbose,
    };
    println!("{}", "🌱 Running Policy Rollouts".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());
    let mut env = IrrigationEnv::new(build_gateway(&args)?);
    let records = run_rollouts(&mut env, &plan)?;
    let summaries = summarize(&records);
    write_reports(&args, &summaries, &records, start_time)?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn announce_banner() {
    println!("{}", "💧 Cropstep Policy Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
    println!("Started {}", run_timestamp().dimmed());
}

fn maybe_list_policies(args: &Args) -> Result<bool> {
    if !args.list_policies {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available policies:")?;
    for strategy in IrrigationStrategy::ALL {
        writeln!(
            output_target.writer(),
            "  {:12} - {}",
            strategy.key(),
            strategy.description()
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn build_base_config(args: &Args) -> Result<EpisodeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EpisodeConfig::from_json(&text)
                .with_context(|| format!("invalid episode config {}", path.display()))?
        }
        None => EpisodeConfig::default(),
    };
    if let Some(days) = args.season_length {
        config.season_length = days;
    }
    if let Some(mode) = &args.reward_mode {
        let mode: RewardMode = mode.parse()?;
        config.reward.mode = mode;
    }
    if args.timeout_ms.is_some() {
        config.simulator_timeout_ms = args.timeout_ms;
    }
    config.workspace_dir.clone_from(&args.workspace);
    if args.log_dir.is_some() {
        config.log_dir.clone_from(&args.log_dir);
    }
    config
        .validate()
        .context("episode configuration failed validation")?;
    log::debug!(
        "base config: {} planted {}, season {} days, reward {}",
        config.location,
        config.planting_date,
        config.season_length,
        config.reward.mode
    );
    Ok(config)
}

fn load_scenario_ranges(args: &Args) -> Result<Option<ScenarioRanges>> {
    if !args.randomize {
        if args.scenario_ranges.is_some() {
            eprintln!("⚠️  --scenario-ranges has no effect without --randomize");
        }
        return Ok(None);
    }
    let Some(path) = &args.scenario_ranges else {
        return Ok(Some(ScenarioRanges::default()));
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let ranges = ScenarioRanges::from_json(&text)
        .with_context(|| format!("invalid scenario ranges {}", path.display()))?;
    Ok(Some(ranges))
}

fn process_gateway(args: &Args) -> Result<ProcessGateway> {
    match &args.simulator {
        Some(program) => Ok(ProcessGateway::new(program.clone())),
        None => Ok(
            ProcessGateway::new(std::env::current_exe().context("locating the tester binary")?)
                .with_args(["--simulate-in", "."]),
        ),
    }
}

fn build_gateway(args: &Args) -> Result<Box<dyn SimulationGateway>> {
    match args.gateway {
        GatewayKind::Reference => Ok(Box::new(ReferenceSimulator::new())),
        GatewayKind::Process => Ok(Box::new(process_gateway(args)?)),
    }
}

fn run_determinism(
    args: &Args,
    base: &EpisodeConfig,
    strategies: &[IrrigationStrategy],
    seeds: &[u64],
) -> Result<Vec<DeterminismReport>> {
    let process = match args.gateway {
        GatewayKind::Reference => None,
        GatewayKind::Process => Some(process_gateway(args)?),
    };
    let make_env = || {
        let gateway: Box<dyn SimulationGateway> = match &process {
            Some(gateway) => Box::new(gateway.clone()),
            None => Box::new(ReferenceSimulator::new()),
        };
        IrrigationEnv::new(gateway)
    };

    let mut reports = Vec::new();
    for &strategy in strategies {
        for &seed in seeds {
            let mut config = base.clone();
            config.seed = seed;
            reports.push(check_determinism(make_env, &config, strategy)?);
        }
    }
    Ok(reports)
}

/// Serve one full-season run for the process gateway.
fn simulate_in(dir: &Path) -> Result<()> {
    let input_path = dir.join(PLAN_FILE);
    let text = fs::read_to_string(&input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    let input: SimulationInputFile = serde_json::from_str(&text)
        .with_context(|| format!("failed to decode {}", input_path.display()))?;
    let output = ReferenceSimulator::simulate(&input.plan, &input.inputs);
    log::info!(
        "simulated {} rows for {} irrigation events in {}",
        output.rows.len(),
        input.plan.len(),
        dir.display()
    );
    let rows_path = dir.join(ROWS_FILE);
    let file = File::create(&rows_path)
        .with_context(|| format!("failed to create {}", rows_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &output)?;
    writer.flush()?;
    Ok(())
}

fn write_range_report(args: &Args, dir: &Path) -> Result<()> {
    let report = scan_logs(dir)?;
    let mut output_target = OutputTarget::new(args.output.clone())?;
    if args.report == "json" {
        serde_json::to_writer_pretty(output_target.writer(), &report)?;
        writeln!(output_target.writer())?;
    } else {
        logic::reports::generate_range_report(output_target.writer(), &report)?;
    }
    output_target.flush_inner()?;
    Ok(())
}

fn write_reports(
    args: &Args,
    summaries: &[PolicySummary],
    records: &[EpisodeRecord],
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(output_target.writer(), summaries, records)?,
        "markdown" => {
            if records.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Cropstep Policy Rollouts\n\n_No episodes executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(output_target.writer(), summaries, records)?;
            }
        }
        "csv" => logic::reports::generate_csv_report(output_target.writer(), records)?,
        _ => {
            let duration = start_time.elapsed();
            if records.is_empty() {
                writeln!(&mut output_target, "No episodes executed.")?;
            } else {
                logic::reports::generate_console_report(
                    output_target.writer(),
                    summaries,
                    records,
                    duration,
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
