//! Seed management for reproducible fault injection.

use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Harness seed for reproducibility
///
/// Every random decision in the harness (chaos evaluation, random
/// workflow branching) draws from an RNG derived from one of these, so
/// a whole run can be replayed from a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessSeed {
    /// Base seed value
    pub seed: u64,
}

impl HarnessSeed {
    /// Create a seed from a literal value
    #[must_use]
    pub const fn from_literal(seed: u64) -> Self {
        Self { seed }
    }

    /// Create a seed from a string (hashed)
    #[must_use]
    pub fn from_string(s: &str) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(s.as_bytes());
        Self {
            seed: hasher.finish(),
        }
    }

    /// Derive a seed for a specific context
    ///
    /// Different contexts give different seeds; the same context always
    /// gives the same seed.
    #[must_use]
    pub fn derive(&self, context: &str) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write_u64(self.seed);
        hasher.write(context.as_bytes());
        Self {
            seed: hasher.finish(),
        }
    }

    /// Create RNG from the seed
    #[must_use]
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

impl Default for HarnessSeed {
    fn default() -> Self {
        Self::from_literal(42)
    }
}
