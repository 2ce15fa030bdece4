use std::hash::Hasher;

use anyhow::{Context, Result};
use cropstep_env::{EpisodeConfig, IrrigationEnv, SimulationGateway};
use serde::Serialize;
use sha2::{Digest, Sha256};
use twox_hash::XxHash64;

use super::policy::IrrigationStrategy;

/// Fingerprint of one episode trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrajectoryFingerprint {
    pub steps: u32,
    /// Hash over every observation value and reward.
    pub trajectory_hash: u64,
    /// Digest of the episode CSV log.
    pub log_digest: [u8; 32],
}

impl TrajectoryFingerprint {
    #[must_use]
    pub fn log_digest_hex(&self) -> String {
        self.log_digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Result of replaying one configuration twice.
#[derive(Debug, Clone, Serialize)]
pub struct DeterminismReport {
    pub policy: String,
    pub seed: u64,
    pub first: TrajectoryFingerprint,
    pub second: TrajectoryFingerprint,
}

impl DeterminismReport {
    #[must_use]
    pub fn matches(&self) -> bool {
        self.first == self.second
    }
}

/// Roll out `strategy` once on `config` and fingerprint the trajectory.
///
/// # Errors
///
/// Returns an error when reset or a step fails.
pub fn fingerprint<G: SimulationGateway>(
    env: &mut IrrigationEnv<G>,
    config: EpisodeConfig,
    strategy: IrrigationStrategy,
) -> Result<TrajectoryFingerprint> {
    let mut policy = strategy.create_policy(config.seed);
    let reset = env.reset(config).context("reset for determinism check")?;
    let mut hasher = XxHash64::with_seed(0);
    for value in reset.observation.values() {
        hasher.write_u64(value.to_bits());
    }

    let mut raw = reset.info.raw;
    let mut day = 0;
    loop {
        let outcome = env.step(policy.decide(day, &raw))?;
        for value in outcome.observation.values() {
            hasher.write_u64(value.to_bits());
        }
        hasher.write_u64(outcome.reward.to_bits());
        raw = outcome.info.raw;
        day = outcome.info.day;
        if outcome.done {
            break;
        }
    }

    let csv = env.log().context("episode log missing")?.to_csv();
    let mut digest = Sha256::new();
    digest.update(csv.as_bytes());
    let mut log_digest = [0_u8; 32];
    log_digest.copy_from_slice(&digest.finalize());
    Ok(TrajectoryFingerprint {
        steps: day,
        trajectory_hash: hasher.finish(),
        log_digest,
    })
}

/// Replay the same configuration in two fresh environments and compare fingerprints.
///
/// # Errors
///
/// Returns an error when either rollout fails.
pub fn check_determinism<G, F>(
    mut make_env: F,
    config: &EpisodeConfig,
    strategy: IrrigationStrategy,
) -> Result<DeterminismReport>
where
    G: SimulationGateway,
    F: FnMut() -> IrrigationEnv<G>,
{
    let first = fingerprint(&mut make_env(), config.clone(), strategy)?;
    let second = fingerprint(&mut make_env(), config.clone(), strategy)?;
    Ok(DeterminismReport {
        policy: strategy.key().to_string(),
        seed: config.seed,
        first,
        second,
    })
}
