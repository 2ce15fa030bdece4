//! Domain-separated seed derivation for the crate's random streams.
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

/// Stream tag for synthetic weather generation.
pub const WEATHER_STREAM: &[u8] = b"weather";
/// Stream tag for synthetic soil generation.
pub const SOIL_STREAM: &[u8] = b"soil";
/// Stream tag for randomized scenario sampling.
pub const SCENARIO_STREAM: &[u8] = b"scenario";
/// Stream tag for stochastic baseline policies.
pub const POLICY_STREAM: &[u8] = b"policy";

/// Derive an independent 64-bit seed for `domain_tag` from a user seed.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let key = user_seed.to_le_bytes();
    let digest = match Hmac::<Sha256>::new_from_slice(&key) {
        Ok(mut mac) => {
            mac.update(domain_tag);
            mac.finalize().into_bytes()
        }
        Err(_) => Sha256::new().chain_update(key).chain_update(domain_tag).finalize(),
    };
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// ChaCha stream dedicated to `domain_tag`.
#[must_use]
pub fn stream_rng(user_seed: u64, domain_tag: &[u8]) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(derive_stream_seed(user_seed, domain_tag))
}

/// Fold a free-form label (station id, scenario key) into a seed.
#[must_use]
pub fn seed_from_label(label: &str) -> u64 {
    let digest = Sha256::digest(label.as_bytes());
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn streams_are_stable_and_separated() {
        assert_eq!(
            derive_stream_seed(7, WEATHER_STREAM),
            derive_stream_seed(7, WEATHER_STREAM)
        );
        assert_ne!(
            derive_stream_seed(7, WEATHER_STREAM),
            derive_stream_seed(7, SOIL_STREAM)
        );
        assert_ne!(
            derive_stream_seed(7, WEATHER_STREAM),
            derive_stream_seed(8, WEATHER_STREAM)
        );
    }

    #[test]
    fn stream_rng_replays() {
        let mut a = stream_rng(42, SCENARIO_STREAM);
        let mut b = stream_rng(42, SCENARIO_STREAM);
        let xs: Vec<u32> = (0..8).map(|_| a.r#gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.r#gen()).collect();
        assert_eq!(xs, ys);
        assert_eq!(seed_from_label("WRLD"), seed_from_label("WRLD"));
    }
}
