use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{SamplingConfig, SamplingOverrides, SamplingParameters};
use crate::errors::ComposeError;

/// Distributed worker coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DistributedContext {
    /// This worker's rank, `0 <= rank < world_size`.
    pub rank: usize,
    /// Total number of workers, at least 1.
    pub world_size: usize,
}

impl DistributedContext {
    /// Validated constructor; rejects `world_size == 0` and out-of-range ranks.
    pub fn new(rank: usize, world_size: usize) -> Result<Self, ComposeError> {
        if world_size == 0 {
            return Err(ComposeError::configuration(
                "distributed.world_size",
                "world size must be at least 1",
            ));
        }
        if rank >= world_size {
            return Err(ComposeError::configuration(
                "distributed.rank",
                format!("rank {rank} is not below world size {world_size}"),
            ));
        }
        Ok(Self { rank, world_size })
    }

    /// Single-process context: rank 0 of 1.
    pub fn single() -> Self {
        Self {
            rank: 0,
            world_size: 1,
        }
    }
}

/// Everything a composition tree needs to resolve into a sampled stream.
///
/// Contexts are immutable value types: the `with_*` methods return functional
/// copies. The one deliberate exception is the rank-rotation counter, which
/// every copy shares by reference so that sibling nodes in a single
/// resolution pass draw from one global rotation rather than restarting it
/// per subtree.
#[derive(Clone, Debug)]
pub struct SamplingContext {
    config: SamplingConfig,
    parameters: SamplingParameters,
    cache_directory: Option<PathBuf>,
    distributed: DistributedContext,
    dataset_name: String,
    rank_counter: Arc<AtomicU64>,
}

impl SamplingContext {
    /// Create a context with a fresh rank-rotation counter.
    pub fn new(
        config: SamplingConfig,
        parameters: SamplingParameters,
        distributed: DistributedContext,
        dataset_name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            parameters,
            cache_directory: None,
            distributed,
            dataset_name: dataset_name.into(),
            rank_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach a cache directory under which sample-order artifacts and
    /// provider indices may be persisted.
    pub fn with_cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(directory.into());
        self
    }

    /// Dataset-intrinsic sampling configuration.
    pub fn config(&self) -> SamplingConfig {
        self.config
    }

    /// Usage-intrinsic sampling parameters.
    pub fn parameters(&self) -> SamplingParameters {
        self.parameters
    }

    /// Cache directory, if one was attached.
    pub fn cache_directory(&self) -> Option<&Path> {
        self.cache_directory.as_deref()
    }

    /// Distributed worker coordinates.
    pub fn distributed(&self) -> DistributedContext {
        self.distributed
    }

    /// Name of the dataset being resolved.
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Functional copy with `overrides` merged into the config; only
    /// explicitly set patch fields change, and the rank counter is shared.
    pub fn with_overrides(&self, overrides: &SamplingOverrides) -> Self {
        self.with_config(self.config.merged(overrides))
    }

    /// Functional copy with a replaced config; the rank counter is shared.
    pub fn with_config(&self, config: SamplingConfig) -> Self {
        let mut copy = self.clone();
        copy.config = config;
        copy
    }

    /// Functional copy with replaced parameters; the rank counter is shared.
    pub fn with_parameters(&self, parameters: SamplingParameters) -> Self {
        let mut copy = self.clone();
        copy.parameters = parameters;
        copy
    }

    /// Next rank in the shared round-robin rotation.
    ///
    /// Every rank resolving the same tree observes the same call sequence,
    /// so all ranks agree on which one owns each expensive build. The
    /// counter advances globally across all copies of this context.
    pub fn get_next_rank(&self) -> usize {
        let next = self.rank_counter.fetch_add(1, Ordering::Relaxed);
        (next % self.distributed.world_size as u64) as usize
    }
}
