#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Weighted blending of sampled streams.
pub mod blend;
/// Declarative dataset-composition trees.
pub mod composition;
/// Sampling configuration, override patches, and parameters.
pub mod config;
/// Crate-wide constants.
pub mod constants;
/// Sampling context and distributed worker coordinates.
pub mod context;
/// Indexed corpus traits and combinators.
pub mod corpus;
/// Fixed-length sampled streams and the persisted order cache.
pub mod stream;
/// Common type aliases.
pub mod types;
/// Numeric helpers for weights and slice boundaries.
pub mod utils;

mod errors;
mod hash;
mod rng;

pub use blend::BlendedStream;
pub use composition::{CorpusConfig, DatasetConfig};
pub use config::{SamplingConfig, SamplingOverrides, SamplingParameters};
pub use context::{DistributedContext, SamplingContext};
pub use corpus::{ConcatenatedCorpus, CorpusProvider, CorpusSlice, IndexedCorpus, MemoryCorpus};
pub use errors::ComposeError;
pub use stream::{SampledStream, ShuffledStream};
pub use types::{DatasetName, RawSample};
