//! Fixed-length sampled streams over indexed corpora.
//!
//! A stream exposes exactly `num_samples` samples in a deterministic order.
//! `ShuffledStream` draws that order by concatenating per-epoch permutations
//! of its corpus, so every corpus sample is visited once per epoch before
//! any sample repeats.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;

use crate::constants::cache::{
    BITCODE_PREFIX, ORDER_FILE_EXTENSION, ORDER_RECORD_VERSION, ORDER_TMP_SUFFIX,
    POLL_INTERVAL_MS, POLL_TIMEOUT_MS,
};
use crate::context::SamplingContext;
use crate::corpus::IndexedCorpus;
use crate::errors::ComposeError;
use crate::hash::{stable_hash_indexed, stable_hash_with};
use crate::rng::DeterministicRng;
use crate::types::RawSample;

/// Fixed-length deterministic stream of samples.
pub trait SampledStream: Send + Sync {
    /// Stable stream name used in errors and logs.
    fn name(&self) -> &str;
    /// Number of samples the stream exposes.
    fn len(&self) -> usize;
    /// Whether the stream exposes no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Fetch the sample at `index` in stream order.
    fn get(&self, index: usize) -> Result<RawSample, ComposeError>;
}

/// Persisted shape of a precomputed sample order.
#[derive(bitcode::Encode, bitcode::Decode)]
struct PersistedOrder {
    checksum: u64,
    order: Vec<u64>,
}

/// Epoch-shuffled stream over an indexed corpus.
///
/// The order is a function of the sampling seed, the corpus name, and the
/// requested length only, so any two processes with the same inputs produce
/// byte-identical orders. When the context carries a cache directory the
/// order is computed once by a single owning rank and persisted; other ranks
/// wait for the artifact instead of recomputing it.
pub struct ShuffledStream {
    name: String,
    corpus: Arc<dyn IndexedCorpus>,
    order: Vec<u64>,
}

impl std::fmt::Debug for ShuffledStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShuffledStream")
            .field("name", &self.name)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl ShuffledStream {
    /// Resolve a shuffled stream of `context.parameters().num_samples`
    /// samples over `corpus`.
    ///
    /// Always advances the shared rank rotation exactly once, even when no
    /// cache directory is attached, so sibling streams stay aligned across
    /// ranks regardless of caching.
    pub fn sample(
        corpus: Arc<dyn IndexedCorpus>,
        context: &SamplingContext,
    ) -> Result<Self, ComposeError> {
        let owner = context.get_next_rank();
        let num_samples = context.parameters().num_samples;
        let name = corpus.name().to_string();

        if corpus.is_empty() && num_samples > 0 {
            return Err(ComposeError::Provider(format!(
                "corpus '{name}' is empty but {num_samples} samples were requested"
            )));
        }

        let seed = context.config().seed;
        let order = match context.cache_directory() {
            Some(directory) if num_samples > 0 => Self::cached_order(
                directory,
                &name,
                seed,
                corpus.len(),
                num_samples,
                owner,
                context,
            )?,
            _ => build_order(seed, &name, corpus.len(), num_samples),
        };

        Ok(Self {
            name,
            corpus,
            order,
        })
    }

    fn cached_order(
        directory: &Path,
        name: &str,
        seed: u64,
        corpus_len: usize,
        num_samples: usize,
        owner: usize,
        context: &SamplingContext,
    ) -> Result<Vec<u64>, ComposeError> {
        let path = order_path(directory, name, seed, corpus_len, num_samples);
        if path.is_file() {
            return load_order(&path);
        }
        if context.distributed().rank == owner {
            let order = build_order(seed, name, corpus_len, num_samples);
            store_order(&path, &order)?;
            tracing::debug!(
                path = %path.display(),
                samples = num_samples,
                "wrote sample-order artifact"
            );
            return Ok(order);
        }
        wait_for_order(&path, owner)
    }
}

impl SampledStream for ShuffledStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn get(&self, index: usize) -> Result<RawSample, ComposeError> {
        let position = self
            .order
            .get(index)
            .ok_or_else(|| ComposeError::IndexOutOfRange {
                dataset: self.name.clone(),
                index,
                len: self.order.len(),
            })?;
        self.corpus.get(*position as usize)
    }
}

/// Concatenated per-epoch permutations, truncated to `num_samples`.
///
/// Each epoch gets its own rng seeded from (seed, name, epoch), so extending
/// `num_samples` never perturbs the order already produced for earlier
/// epochs.
fn build_order(seed: u64, name: &str, corpus_len: usize, num_samples: usize) -> Vec<u64> {
    if num_samples == 0 || corpus_len == 0 {
        return Vec::new();
    }
    let epochs = num_samples.div_ceil(corpus_len);
    let mut order = Vec::with_capacity(epochs * corpus_len);
    for epoch in 0..epochs {
        let mut permutation: Vec<u64> = (0..corpus_len as u64).collect();
        let mut rng = DeterministicRng::new(stable_hash_indexed(seed, name, epoch as u64));
        permutation.shuffle(&mut rng);
        order.extend(permutation);
    }
    order.truncate(num_samples);
    order
}

fn order_path(
    directory: &Path,
    name: &str,
    seed: u64,
    corpus_len: usize,
    num_samples: usize,
) -> PathBuf {
    directory.join(format!(
        "{name}_seed{seed}_len{corpus_len}_n{num_samples}.{ORDER_FILE_EXTENSION}"
    ))
}

fn order_checksum(order: &[u64]) -> u64 {
    use std::hash::Hash;
    stable_hash_with(|hasher| order.hash(hasher))
}

/// Write the artifact to a temporary sibling, then rename into place so
/// readers only ever observe complete files.
fn store_order(path: &Path, order: &[u64]) -> Result<(), ComposeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let record = PersistedOrder {
        checksum: order_checksum(order),
        order: order.to_vec(),
    };
    let mut bytes = vec![ORDER_RECORD_VERSION, BITCODE_PREFIX];
    bytes.extend(bitcode::encode(&record));

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(ORDER_TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_order(path: &Path) -> Result<Vec<u64>, ComposeError> {
    let bytes = fs::read(path)?;
    let payload = match bytes.as_slice() {
        [ORDER_RECORD_VERSION, BITCODE_PREFIX, payload @ ..] => payload,
        _ => {
            return Err(ComposeError::Provider(format!(
                "sample-order artifact {} has an unrecognized header",
                path.display()
            )));
        }
    };
    let record: PersistedOrder = bitcode::decode(payload).map_err(|error| {
        ComposeError::Provider(format!(
            "sample-order artifact {} failed to decode: {error}",
            path.display()
        ))
    })?;
    if record.checksum != order_checksum(&record.order) {
        return Err(ComposeError::Provider(format!(
            "sample-order artifact {} failed its checksum",
            path.display()
        )));
    }
    Ok(record.order)
}

fn wait_for_order(path: &Path, owner: usize) -> Result<Vec<u64>, ComposeError> {
    let deadline = Instant::now() + Duration::from_millis(POLL_TIMEOUT_MS);
    tracing::debug!(
        path = %path.display(),
        owner,
        "waiting for sample-order artifact"
    );
    loop {
        if path.is_file() {
            return load_order(path);
        }
        if Instant::now() >= deadline {
            return Err(ComposeError::CacheUnavailable {
                path: path.to_path_buf(),
                owner,
            });
        }
        thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
}
