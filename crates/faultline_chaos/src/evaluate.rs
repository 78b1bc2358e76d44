//! Fault-injection outcome evaluation.
//!
//! Pure function of (configuration snapshot, caller timeout budget,
//! randomness) so every decision is reproducible under a seeded RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ChaosConfig, ChaosMode};

/// Default failure probability for `probabilisticError` mode
pub const DEFAULT_ERROR_PROBABILITY: f64 = 0.2;
/// Default stall probability for `timeout` mode
pub const DEFAULT_TIMEOUT_PROBABILITY: f64 = 1.0;
/// Default status code for forced failures
pub const DEFAULT_FORCE_STATUS: u16 = 500;

/// Result of evaluating a chaos configuration for one inbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosOutcome {
    /// The call must fail before doing any work
    pub should_fail: bool,
    /// Status code to fail with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Latency to sleep before answering, in milliseconds
    pub simulated_latency_ms: u64,
    /// The call must stall past the caller's patience window
    pub should_timeout: bool,
}

impl ChaosOutcome {
    /// Outcome with no injected fault
    #[must_use]
    pub fn pass(simulated_latency_ms: u64) -> Self {
        Self {
            should_fail: false,
            status_code: None,
            error_message: None,
            simulated_latency_ms,
            should_timeout: false,
        }
    }
}

fn random_bool<R: Rng>(rng: &mut R, probability: f64) -> bool {
    rng.r#gen::<f64>() < probability
}

/// Compute the injected outcome for one inbound call.
///
/// Latency is computed first, independent of mode: a well-formed random
/// range wins over a fixed value, which wins over zero. The configured
/// latency applies under `forceStatus` and `probabilisticError` too;
/// only `timeout` mode overrides it with `timeout_ms + 1000`.
pub fn evaluate_chaos<R: Rng>(config: &ChaosConfig, timeout_ms: u64, rng: &mut R) -> ChaosOutcome {
    let mut simulated_latency_ms = 0;

    if let Some(fixed) = config.fixed_latency_ms {
        if fixed > 0 {
            simulated_latency_ms = fixed;
        }
    }

    if let (Some(min), Some(max)) = (config.random_latency_min_ms, config.random_latency_max_ms) {
        if max >= min {
            simulated_latency_ms = rng.gen_range(min..=max);
        }
    }

    match config.mode {
        ChaosMode::Latency => ChaosOutcome::pass(simulated_latency_ms),
        ChaosMode::ForceStatus => {
            let status = config.force_status_code.unwrap_or(DEFAULT_FORCE_STATUS);
            ChaosOutcome {
                should_fail: true,
                status_code: Some(status),
                error_message: Some(format!("forced status {}", status)),
                simulated_latency_ms,
                should_timeout: false,
            }
        }
        ChaosMode::ProbabilisticError => {
            let probability = config.error_probability.unwrap_or(DEFAULT_ERROR_PROBABILITY);
            let fail = random_bool(rng, probability);
            ChaosOutcome {
                should_fail: fail,
                status_code: Some(if fail { 500 } else { 200 }),
                error_message: fail.then(|| "probabilistic failure".to_string()),
                simulated_latency_ms,
                should_timeout: false,
            }
        }
        ChaosMode::Timeout => {
            let probability = config
                .timeout_probability
                .unwrap_or(DEFAULT_TIMEOUT_PROBABILITY);
            ChaosOutcome {
                should_fail: false,
                status_code: None,
                error_message: None,
                simulated_latency_ms: timeout_ms + 1000,
                should_timeout: random_bool(rng, probability),
            }
        }
        ChaosMode::Normal => ChaosOutcome::pass(simulated_latency_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::HarnessSeed;

    fn config(mode: ChaosMode) -> ChaosConfig {
        let mut config = ChaosConfig::normal("alpha");
        config.mode = mode;
        config
    }

    #[test]
    fn test_normal_passes() {
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&config(ChaosMode::Normal), 2000, &mut rng);
        assert_eq!(outcome, ChaosOutcome::pass(0));
    }

    #[test]
    fn test_force_status_always_fails() {
        let mut cfg = config(ChaosMode::ForceStatus);
        cfg.force_status_code = Some(503);
        let mut rng = HarnessSeed::from_literal(42).rng();
        for _ in 0..10 {
            let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
            assert!(outcome.should_fail);
            assert_eq!(outcome.status_code, Some(503));
            assert_eq!(outcome.error_message.as_deref(), Some("forced status 503"));
            assert!(!outcome.should_timeout);
        }
    }

    #[test]
    fn test_force_status_defaults_to_500() {
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&config(ChaosMode::ForceStatus), 2000, &mut rng);
        assert_eq!(outcome.status_code, Some(500));
    }

    #[test]
    fn test_probabilistic_error_certain() {
        let mut cfg = config(ChaosMode::ProbabilisticError);
        cfg.error_probability = Some(1.0);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!(outcome.should_fail);
        assert_eq!(outcome.status_code, Some(500));
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("probabilistic failure")
        );
    }

    #[test]
    fn test_probabilistic_error_never() {
        let mut cfg = config(ChaosMode::ProbabilisticError);
        cfg.error_probability = Some(0.0);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!(!outcome.should_fail);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.error_message.is_none());
    }

    #[test]
    fn test_timeout_mode_overrides_latency() {
        let mut cfg = config(ChaosMode::Timeout);
        cfg.fixed_latency_ms = Some(50);
        cfg.timeout_probability = Some(1.0);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!(outcome.should_timeout);
        assert!(!outcome.should_fail);
        assert_eq!(outcome.simulated_latency_ms, 3000);
    }

    #[test]
    fn test_timeout_probability_zero_never_stalls() {
        let mut cfg = config(ChaosMode::Timeout);
        cfg.timeout_probability = Some(0.0);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!(!outcome.should_timeout);
        assert_eq!(outcome.simulated_latency_ms, 3000);
    }

    #[test]
    fn test_fixed_latency_applies() {
        let mut cfg = config(ChaosMode::Latency);
        cfg.fixed_latency_ms = Some(120);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!(!outcome.should_fail);
        assert_eq!(outcome.simulated_latency_ms, 120);
    }

    #[test]
    fn test_random_latency_range_inclusive() {
        let mut cfg = config(ChaosMode::Latency);
        cfg.random_latency_min_ms = Some(10);
        cfg.random_latency_max_ms = Some(20);
        let mut rng = HarnessSeed::from_literal(42).rng();
        for _ in 0..100 {
            let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
            assert!((10..=20).contains(&outcome.simulated_latency_ms));
        }
    }

    #[test]
    fn test_random_latency_wins_over_fixed() {
        let mut cfg = config(ChaosMode::Latency);
        cfg.fixed_latency_ms = Some(500);
        cfg.random_latency_min_ms = Some(10);
        cfg.random_latency_max_ms = Some(20);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!((10..=20).contains(&outcome.simulated_latency_ms));
    }

    #[test]
    fn test_inverted_range_falls_back_to_fixed() {
        let mut cfg = config(ChaosMode::Latency);
        cfg.fixed_latency_ms = Some(500);
        cfg.random_latency_min_ms = Some(20);
        cfg.random_latency_max_ms = Some(10);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert_eq!(outcome.simulated_latency_ms, 500);
    }

    #[test]
    fn test_latency_applies_under_force_status() {
        let mut cfg = config(ChaosMode::ForceStatus);
        cfg.fixed_latency_ms = Some(75);
        let mut rng = HarnessSeed::from_literal(42).rng();
        let outcome = evaluate_chaos(&cfg, 2000, &mut rng);
        assert!(outcome.should_fail);
        assert_eq!(outcome.simulated_latency_ms, 75);
    }

    #[test]
    fn test_same_seed_same_outcomes() {
        let mut cfg = config(ChaosMode::ProbabilisticError);
        cfg.error_probability = Some(0.5);

        let run = |seed: u64| {
            let mut rng = HarnessSeed::from_literal(seed).rng();
            (0..32)
                .map(|_| evaluate_chaos(&cfg, 2000, &mut rng).should_fail)
                .collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
    }
}
