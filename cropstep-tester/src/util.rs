use anyhow::{Context, Result};
use chrono::Utc;

pub fn run_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse seed tokens; negative numbers wrap to their absolute value.
pub fn parse_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    for token in tokens {
        let seed = if let Ok(value) = token.parse::<i64>() {
            value.unsigned_abs()
        } else {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed '{token}'"))?
        };
        if !seeds.contains(&seed) {
            seeds.push(seed);
        }
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn parse_seeds_accepts_signed_and_large_values() {
        let tokens = vec!["42".to_string(), "-7".to_string(), "18446744073709551615".to_string(), "42".to_string()];
        assert_eq!(parse_seeds(&tokens).unwrap(), vec![42, 7, u64::MAX]);
        assert!(parse_seeds(&["abc".to_string()]).is_err());
    }
}
