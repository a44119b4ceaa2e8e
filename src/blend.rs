//! Weighted blending of sampled streams.
//!
//! A blended stream interleaves its branch streams so that after any prefix
//! of length `p`, branch `i` has contributed close to `weights[i] * p`
//! samples. The full branch-and-local assignment table is computed up front,
//! which makes exhaustion a construction-time error instead of a surprise
//! mid-iteration.

use std::fmt;
use std::sync::Arc;

use crate::constants::blend::{BRANCH_SEED_STRIDE, LEGACY_MARGIN_SIGMAS};
use crate::context::SamplingContext;
use crate::errors::ComposeError;
use crate::hash::stable_hash_indexed;
use crate::stream::SampledStream;
use crate::types::RawSample;

/// Number of samples a branch must be prepared to supply when it carries
/// `weight` of a blend of `num_samples` total samples.
///
/// The default scheme interleaves exactly, so a single extra sample absorbs
/// the worst-case rounding drift. The legacy scheme draws branches at
/// random per position, so its margin is a multiple of the binomial
/// standard deviation.
pub(crate) fn oversampled_count(weight: f64, num_samples: usize, legacy: bool) -> usize {
    let n = num_samples as f64;
    if legacy {
        let margin = LEGACY_MARGIN_SIGMAS * (n * (1.0 - weight)).sqrt();
        (weight * (n + margin)).ceil() as usize
    } else {
        (weight * n).ceil() as usize + 1
    }
}

/// Seed offset applied to the branch at `index`.
///
/// The legacy scheme sampled every branch from the unshifted seed; the
/// default scheme decorrelates branches with a fixed stride.
pub(crate) fn branch_seed_offset(index: usize, legacy: bool) -> u64 {
    if legacy {
        0
    } else {
        index as u64 * BRANCH_SEED_STRIDE
    }
}

/// Map a hash to a uniform draw in `[0, 1)` using its top 53 bits.
fn unit_draw(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

/// Weighted interleaving of branch streams.
pub struct BlendedStream {
    name: String,
    branches: Vec<Arc<dyn SampledStream>>,
    // (branch, index within branch) per output position.
    assignments: Vec<(u32, u32)>,
}

impl BlendedStream {
    /// Blend `branches` under normalized `weights` into a stream of
    /// `context.parameters().num_samples` samples.
    ///
    /// With `legacy` unset, positions are assigned by largest remainder:
    /// each position goes to the branch whose contribution lags its target
    /// the most, so per-branch counts never drift more than one sample from
    /// `weight * prefix_len`. With `legacy` set, each position draws a
    /// branch from a seeded hash of the blend name and position, matching
    /// orders produced by the original randomized scheme.
    ///
    /// Fails with a configuration error when fewer than two branches are
    /// given or the weight list does not match the branch list.
    pub fn new(
        name: impl Into<String>,
        branches: Vec<Arc<dyn SampledStream>>,
        weights: &[f64],
        context: &SamplingContext,
        legacy: bool,
    ) -> Result<Self, ComposeError> {
        let name = name.into();
        if branches.len() != weights.len() {
            return Err(ComposeError::configuration(
                "blended.weights",
                format!(
                    "expected one weight per branch ({}), got {}",
                    branches.len(),
                    weights.len()
                ),
            ));
        }
        if branches.len() < 2 {
            return Err(ComposeError::configuration(
                "blended.datasets",
                format!("at least two branches are required, got {}", branches.len()),
            ));
        }

        let num_samples = context.parameters().num_samples;
        let seed = context.config().seed;
        let mut taken = vec![0usize; branches.len()];
        let mut assignments = Vec::with_capacity(num_samples);

        for position in 0..num_samples {
            let branch = if legacy {
                let draw = unit_draw(stable_hash_indexed(seed, &name, position as u64));
                pick_by_draw(weights, draw)
            } else {
                pick_most_lagging(weights, &taken, position)
            };
            let local = taken[branch];
            if local >= branches[branch].len() {
                return Err(ComposeError::SupplyExhausted {
                    branch: branches[branch].name().to_string(),
                    requested: local + 1,
                    available: branches[branch].len(),
                });
            }
            taken[branch] = local + 1;
            assignments.push((branch as u32, local as u32));
        }

        tracing::debug!(
            name = %name,
            samples = num_samples,
            branches = branches.len(),
            legacy,
            "built blend assignment table"
        );

        Ok(Self {
            name,
            branches,
            assignments,
        })
    }
}

/// Branch whose contribution lags its weighted target the most after this
/// position is assigned; ties resolve to the lower index.
fn pick_most_lagging(weights: &[f64], taken: &[usize], position: usize) -> usize {
    let prefix = (position + 1) as f64;
    let mut best = 0;
    let mut best_lag = f64::NEG_INFINITY;
    for (index, weight) in weights.iter().enumerate() {
        let lag = weight * prefix - taken[index] as f64;
        if lag > best_lag {
            best = index;
            best_lag = lag;
        }
    }
    best
}

/// Branch selected by a uniform draw against the cumulative weights.
fn pick_by_draw(weights: &[f64], draw: f64) -> usize {
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if draw < cumulative {
            return index;
        }
    }
    weights.len() - 1
}

impl fmt::Debug for BlendedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlendedStream")
            .field("name", &self.name)
            .field("branches", &self.branches.len())
            .field("samples", &self.assignments.len())
            .finish()
    }
}

impl SampledStream for BlendedStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.assignments.len()
    }

    fn get(&self, index: usize) -> Result<RawSample, ComposeError> {
        let (branch, local) = self
            .assignments
            .get(index)
            .copied()
            .ok_or_else(|| ComposeError::IndexOutOfRange {
                dataset: self.name.clone(),
                index,
                len: self.assignments.len(),
            })?;
        self.branches[branch as usize].get(local as usize)
    }
}
