use serde::{Deserialize, Serialize};

use crate::constants::sampling::DEFAULT_SEED;

/// Dataset-intrinsic sampling configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Seed for deterministic sampling.
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

impl SamplingConfig {
    /// Apply a partial override: explicitly set fields win, unset fields
    /// keep this config's value.
    pub fn merged(self, overrides: &SamplingOverrides) -> Self {
        Self {
            seed: overrides.seed.unwrap_or(self.seed),
        }
    }

    /// Copy with the seed shifted by `offset` (per-branch decorrelation).
    pub fn with_seed_offset(self, offset: u64) -> Self {
        Self {
            seed: self.seed.wrapping_add(offset),
        }
    }
}

/// Partial sampling-config patch; only `Some` fields override the base.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingOverrides {
    /// Replacement seed, when explicitly set.
    pub seed: Option<u64>,
}

impl SamplingOverrides {
    /// Patch that replaces the seed and nothing else.
    pub fn seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

/// Usage-intrinsic sampling parameters, set by the training-loop side
/// rather than by the dataset tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingParameters {
    /// Number of samples the resolved stream must expose.
    pub num_samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_override_fields_inherit_the_base() {
        let base = SamplingConfig { seed: 11 };
        assert_eq!(base.merged(&SamplingOverrides::default()).seed, 11);
        assert_eq!(base.merged(&SamplingOverrides::seed(99)).seed, 99);
    }

    #[test]
    fn default_seed_is_the_documented_constant() {
        assert_eq!(SamplingConfig::default().seed, DEFAULT_SEED);
    }

    #[test]
    fn seed_offset_wraps_instead_of_overflowing() {
        let config = SamplingConfig { seed: u64::MAX };
        assert_eq!(config.with_seed_offset(2).seed, 1);
    }
}
