use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cropstep_env::{
    EpisodeConfig, IrrigationEnv, ScenarioRanges, ScenarioSampler, SimulationGateway,
    TerminationReason,
};
use serde::Serialize;

use super::policy::IrrigationStrategy;

/// Outcome of one rolled-out episode.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeRecord {
    pub policy: String,
    pub seed: u64,
    pub episode: usize,
    pub location: String,
    pub planting_date: String,
    pub steps: u32,
    pub total_reward: f64,
    pub total_irrigation_mm: f64,
    pub irrigation_events: usize,
    pub coerced_actions: usize,
    pub final_biomass: f64,
    pub final_stage: f64,
    pub termination: String,
    pub error_detail: Option<String>,
    pub sentinel_steps: usize,
    pub duration: Duration,
}

impl EpisodeRecord {
    #[must_use]
    pub fn failed(&self) -> bool {
        self.error_detail.is_some()
    }
}

/// Mean and standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Stat {
    pub mean: f64,
    pub std: f64,
}

impl Stat {
    #[must_use]
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Aggregate over all episodes of one policy.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySummary {
    pub policy: String,
    pub episodes: usize,
    pub failures: usize,
    pub reward: Stat,
    pub irrigation_mm: Stat,
    pub final_biomass: Stat,
    pub steps: Stat,
    pub average_duration: Duration,
}

/// What to roll out.
#[derive(Debug, Clone)]
pub struct RolloutPlan {
    pub strategies: Vec<IrrigationStrategy>,
    pub seeds: Vec<u64>,
    pub episodes: usize,
    pub base: EpisodeConfig,
    pub randomize: Option<ScenarioRanges>,
    pub verbose: bool,
}

impl RolloutPlan {
    /// Episode configurations for one seed, in rollout order.
    ///
    /// # Errors
    ///
    /// Returns an error when the randomized ranges or drawn scenarios are invalid.
    pub fn configs_for_seed(&self, seed: u64) -> Result<Vec<EpisodeConfig>> {
        if let Some(ranges) = &self.randomize {
            let mut sampler = ScenarioSampler::new(ranges.clone(), seed)
                .context("invalid scenario ranges")?;
            (0..self.episodes)
                .map(|_| {
                    sampler
                        .next_config(&self.base)
                        .context("sampled scenario failed validation")
                })
                .collect()
        } else {
            Ok((0..self.episodes)
                .map(|episode| {
                    let mut config = self.base.clone();
                    config.seed = seed.wrapping_add(episode as u64);
                    config
                })
                .collect())
        }
    }
}

/// Roll out one episode of `strategy` and summarize it.
///
/// # Errors
///
/// Returns an error when the episode cannot be reset or a step is rejected.
pub fn run_episode<G: SimulationGateway>(
    env: &mut IrrigationEnv<G>,
    config: EpisodeConfig,
    strategy: IrrigationStrategy,
    episode: usize,
) -> Result<EpisodeRecord> {
    let started = Instant::now();
    let seed = config.seed;
    let location = config.location.to_string();
    let planting_date = config.planting_date.to_string();
    let mut policy = strategy.create_policy(seed);
    let reset = env
        .reset(config)
        .with_context(|| format!("reset failed for {location} planted {planting_date}"))?;

    let mut raw = reset.info.raw;
    let mut day = 0;
    let mut coerced_actions = 0;
    let mut sentinel_steps = usize::from(!reset.info.sentinel_fields.is_empty());
    let mut termination = None;
    let mut error_detail = None;
    loop {
        let amount = policy.decide(day, &raw);
        let outcome = env
            .step(amount)
            .with_context(|| format!("{} step on day {day}", policy.name()))?;
        if outcome
            .info
            .action
            .is_some_and(|decision| decision.violation.is_some())
        {
            coerced_actions += 1;
        }
        if !outcome.info.sentinel_fields.is_empty() {
            sentinel_steps += 1;
        }
        raw = outcome.info.raw;
        day = outcome.info.day;
        if outcome.done {
            termination = outcome.info.termination;
            error_detail = outcome.info.error_detail;
            break;
        }
    }

    let plan = env.plan().context("episode vanished after stepping")?;
    Ok(EpisodeRecord {
        policy: strategy.key().to_string(),
        seed,
        episode,
        location,
        planting_date,
        steps: day,
        total_reward: env.total_reward(),
        total_irrigation_mm: plan.total_mm(),
        irrigation_events: plan.len(),
        coerced_actions,
        final_biomass: raw.total_biomass(),
        final_stage: raw.phenological_stage(),
        termination: termination.map_or("unknown", TerminationReason::label).to_string(),
        error_detail,
        sentinel_steps,
        duration: started.elapsed(),
    })
}

/// Run every strategy over every seed and episode.
///
/// # Errors
///
/// Returns the first episode error.
pub fn run_rollouts<G: SimulationGateway>(
    env: &mut IrrigationEnv<G>,
    plan: &RolloutPlan,
) -> Result<Vec<EpisodeRecord>> {
    let mut records = Vec::new();
    for &strategy in &plan.strategies {
        for &seed in &plan.seeds {
            for (episode, config) in plan.configs_for_seed(seed)?.into_iter().enumerate() {
                let record = run_episode(env, config, strategy, episode)?;
                if plan.verbose {
                    println!(
                        "  {} seed {} #{}: reward {:.2}, water {:.1} mm, biomass {:.0} kg/ha ({})",
                        strategy, seed, episode, record.total_reward, record.total_irrigation_mm,
                        record.final_biomass, record.termination
                    );
                }
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Group records per policy, keeping first-seen order.
#[must_use]
pub fn summarize(records: &[EpisodeRecord]) -> Vec<PolicySummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<&EpisodeRecord>> = BTreeMap::new();
    for record in records {
        if !grouped.contains_key(record.policy.as_str()) {
            order.push(record.policy.as_str());
        }
        grouped.entry(record.policy.as_str()).or_default().push(record);
    }

    order
        .into_iter()
        .filter_map(|policy| grouped.get(policy).map(|group| (policy, group)))
        .map(|(policy, group)| {
            let collect = |f: fn(&EpisodeRecord) -> f64| group.iter().map(|r| f(r)).collect::<Vec<_>>();
            let total: Duration = group.iter().map(|r| r.duration).sum();
            let count = u32::try_from(group.len()).unwrap_or(u32::MAX).max(1);
            PolicySummary {
                policy: policy.to_string(),
                episodes: group.len(),
                failures: group.iter().filter(|r| r.failed()).count(),
                reward: Stat::of(&collect(|r| r.total_reward)),
                irrigation_mm: Stat::of(&collect(|r| r.total_irrigation_mm)),
                final_biomass: Stat::of(&collect(|r| r.final_biomass)),
                steps: Stat::of(&collect(|r| f64::from(r.steps))),
                average_duration: total / count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropstep_env::ReferenceSimulator;

    fn base(tag: &str) -> EpisodeConfig {
        EpisodeConfig {
            workspace_dir: std::env::temp_dir().join(format!("cropstep-runner-{tag}")),
            ..EpisodeConfig::generated(12.38, 78.93, 1).with_season_length(25)
        }
    }

    fn sample_record(policy: &str, reward: f64) -> EpisodeRecord {
        EpisodeRecord {
            policy: policy.to_string(),
            seed: 1,
            episode: 0,
            location: "12.38,78.93".to_string(),
            planting_date: "2014-06-02".to_string(),
            steps: 25,
            total_reward: reward,
            total_irrigation_mm: 50.0,
            irrigation_events: 2,
            coerced_actions: 0,
            final_biomass: 1_200.0,
            final_stage: 0.3,
            termination: "season_length".to_string(),
            error_detail: None,
            sentinel_steps: 0,
            duration: Duration::from_millis(4),
        }
    }

    #[test]
    fn stat_of_sample() {
        let stat = Stat::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stat.mean - 5.0).abs() < 1e-12);
        assert!((stat.std - 2.0).abs() < 1e-12);
        assert_eq!(Stat::of(&[]), Stat::default());
    }

    #[test]
    fn summarize_groups_by_policy_in_order() {
        let records = vec![
            sample_record("threshold", 1.0),
            sample_record("none", -1.0),
            sample_record("threshold", 3.0),
        ];
        let summaries = summarize(&records);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].policy, "threshold");
        assert_eq!(summaries[0].episodes, 2);
        assert!((summaries[0].reward.mean - 2.0).abs() < 1e-12);
        assert_eq!(summaries[1].policy, "none");
    }

    #[test]
    fn rollout_runs_every_combination() {
        let plan = RolloutPlan {
            strategies: vec![IrrigationStrategy::Rainfed, IrrigationStrategy::FixedSchedule],
            seeds: vec![3],
            episodes: 2,
            base: base("rollout"),
            randomize: None,
            verbose: false,
        };
        let mut env = IrrigationEnv::new(ReferenceSimulator::new());
        let records = run_rollouts(&mut env, &plan).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.steps == 25 && !r.failed()));
        assert!(records[0].total_irrigation_mm.abs() < f64::EPSILON);
        assert!((records[2].total_irrigation_mm - 100.0).abs() < f64::EPSILON);
        assert_eq!(records[2].termination, "season_length");
    }

    #[test]
    fn randomized_configs_vary_by_episode() {
        let plan = RolloutPlan {
            strategies: vec![IrrigationStrategy::Rainfed],
            seeds: vec![8],
            episodes: 3,
            base: base("randomized"),
            randomize: Some(ScenarioRanges::default()),
            verbose: false,
        };
        let configs = plan.configs_for_seed(8).unwrap();
        assert_eq!(configs.len(), 3);
        assert_ne!(configs[0].location, configs[1].location);
        assert_eq!(configs, plan.configs_for_seed(8).unwrap());
    }
}
