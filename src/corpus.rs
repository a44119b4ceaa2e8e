//! Indexed corpus traits and combinators.
//!
//! Ownership model:
//! - `IndexedCorpus` is the random-access view the composition tree works
//!   against; implementations are immutable once built.
//! - `CorpusProvider` builds an `IndexedCorpus` on demand and may use the
//!   sampling context (cache directory, rank rotation) for expensive index
//!   construction.
//! - `ConcatenatedCorpus` and `CorpusSlice` are pure combinators over
//!   already-built corpora; neither performs I/O.

use std::fmt;
use std::sync::Arc;

use crate::context::SamplingContext;
use crate::errors::ComposeError;
use crate::types::RawSample;
use crate::utils::round_half_even;

/// Random-access sequence of raw samples with a stable name and length.
pub trait IndexedCorpus: Send + Sync {
    /// Stable corpus name used in errors, stream names, and cache keys.
    fn name(&self) -> &str;
    /// Number of samples in the corpus.
    fn len(&self) -> usize;
    /// Whether the corpus holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Fetch the sample at `index`.
    fn get(&self, index: usize) -> Result<RawSample, ComposeError>;
}

/// Builds an `IndexedCorpus` on demand.
///
/// For a fixed on-disk state the built corpus must be stable: two builds
/// with equivalent contexts expose identical names, lengths, and samples.
pub trait CorpusProvider: Send + Sync {
    /// Name of the corpus this provider builds.
    fn name(&self) -> &str;
    /// Build (or open) the corpus.
    fn build(&self, context: &SamplingContext) -> Result<Arc<dyn IndexedCorpus>, ComposeError>;
}

/// In-memory corpus, mainly for tests and small fixtures.
#[derive(Clone, Debug)]
pub struct MemoryCorpus {
    name: String,
    samples: Vec<RawSample>,
}

impl MemoryCorpus {
    /// Create a corpus holding `samples` under `name`.
    pub fn new(name: impl Into<String>, samples: Vec<RawSample>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }
}

impl IndexedCorpus for MemoryCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<RawSample, ComposeError> {
        self.samples
            .get(index)
            .cloned()
            .ok_or_else(|| ComposeError::IndexOutOfRange {
                dataset: self.name.clone(),
                index,
                len: self.samples.len(),
            })
    }
}

impl CorpusProvider for MemoryCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, _context: &SamplingContext) -> Result<Arc<dyn IndexedCorpus>, ComposeError> {
        Ok(Arc::new(self.clone()))
    }
}

/// Presents several corpora as one contiguous corpus.
///
/// A padded cumulative-offset array maps a global index to the owning child
/// via binary search, so `get` costs O(log N) on top of the child access.
pub struct ConcatenatedCorpus {
    name: String,
    corpora: Vec<Arc<dyn IndexedCorpus>>,
    // offsets[0] == 0, offsets[j] == sum of the first j corpus lengths.
    offsets: Vec<usize>,
}

impl ConcatenatedCorpus {
    /// Merge `corpora` in order under `name`; requires at least one corpus.
    pub fn new(
        name: impl Into<String>,
        corpora: Vec<Arc<dyn IndexedCorpus>>,
    ) -> Result<Self, ComposeError> {
        if corpora.is_empty() {
            return Err(ComposeError::configuration(
                "concatenated.datasets",
                "at least one dataset is required",
            ));
        }
        let mut offsets = Vec::with_capacity(corpora.len() + 1);
        offsets.push(0);
        for corpus in &corpora {
            offsets.push(offsets.last().copied().unwrap_or(0) + corpus.len());
        }
        Ok(Self {
            name: name.into(),
            corpora,
            offsets,
        })
    }
}

impl fmt::Debug for ConcatenatedCorpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatenatedCorpus")
            .field("name", &self.name)
            .field("offsets", &self.offsets)
            .finish()
    }
}

impl IndexedCorpus for ConcatenatedCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<RawSample, ComposeError> {
        let total = self.len();
        if index >= total {
            return Err(ComposeError::IndexOutOfRange {
                dataset: self.name.clone(),
                index,
                len: total,
            });
        }
        let child = self.offsets.partition_point(|&offset| offset <= index) - 1;
        self.corpora[child].get(index - self.offsets[child])
    }
}

/// Contiguous sub-range of a corpus selected by fractional bounds.
///
/// Boundaries are `round_half_even(begin * len)` and
/// `round_half_even(end * len)`; the rounding rule is a pinned contract
/// because it decides exact split points between, say, train and validation.
pub struct CorpusSlice {
    name: String,
    corpus: Arc<dyn IndexedCorpus>,
    lo: usize,
    len: usize,
}

impl CorpusSlice {
    /// Restrict `corpus` to the fraction range `[begin, end)`.
    pub fn new(corpus: Arc<dyn IndexedCorpus>, begin: f64, end: f64) -> Result<Self, ComposeError> {
        validate_slice_range(begin, end, "sliced")?;
        let total = corpus.len();
        let lo = round_half_even(begin * total as f64);
        let hi = round_half_even(end * total as f64);
        Ok(Self {
            // Debug formatting keeps integral fractions as `0.0` / `1.0`,
            // which the cache-artifact keys derived from this name rely on.
            name: format!("{}_{begin:?}_{end:?}", corpus.name()),
            corpus,
            lo,
            len: hi - lo,
        })
    }
}

impl fmt::Debug for CorpusSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorpusSlice")
            .field("name", &self.name)
            .field("lo", &self.lo)
            .field("len", &self.len)
            .finish()
    }
}

impl IndexedCorpus for CorpusSlice {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<RawSample, ComposeError> {
        if index >= self.len {
            return Err(ComposeError::IndexOutOfRange {
                dataset: self.name.clone(),
                index,
                len: self.len,
            });
        }
        self.corpus.get(self.lo + index)
    }
}

pub(crate) fn validate_slice_range(
    begin: f64,
    end: f64,
    path: &str,
) -> Result<(), ComposeError> {
    if !begin.is_finite() || !end.is_finite() || !(0.0..=1.0).contains(&begin) || end > 1.0 {
        return Err(ComposeError::configuration(
            path,
            format!("slice bounds must lie in [0, 1], got begin={begin}, end={end}"),
        ));
    }
    if begin >= end {
        return Err(ComposeError::configuration(
            path,
            format!("slice begin must be below end, got begin={begin}, end={end}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted(name: &str, len: u32) -> Arc<dyn IndexedCorpus> {
        Arc::new(MemoryCorpus::new(
            name,
            (0..len).map(|value| vec![value]).collect(),
        ))
    }

    #[test]
    fn concatenation_builds_cumulative_offsets() {
        let merged = ConcatenatedCorpus::new(
            "merged",
            vec![counted("a", 10), counted("b", 20), counted("c", 5)],
        )
        .unwrap();

        assert_eq!(merged.offsets, vec![0, 10, 30, 35]);
        assert_eq!(merged.len(), 35);
        // Last element of the middle corpus, first element of the last one.
        assert_eq!(merged.get(29).unwrap(), vec![19]);
        assert_eq!(merged.get(30).unwrap(), vec![0]);
        assert_eq!(merged.get(0).unwrap(), vec![0]);
        assert_eq!(merged.get(34).unwrap(), vec![4]);
    }

    #[test]
    fn concatenation_rejects_empty_lists_and_bad_indices() {
        let err = ConcatenatedCorpus::new("merged", Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Configuration { ref path, .. } if path == "concatenated.datasets"
        ));

        let merged = ConcatenatedCorpus::new("merged", vec![counted("a", 3)]).unwrap();
        assert!(matches!(
            merged.get(3),
            Err(ComposeError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
    }

    #[test]
    fn slices_partition_a_corpus_without_overlap() {
        let base = counted("base", 10);
        let head = CorpusSlice::new(base.clone(), 0.0, 0.5).unwrap();
        let tail = CorpusSlice::new(base.clone(), 0.5, 1.0).unwrap();

        assert_eq!(head.len(), 5);
        assert_eq!(tail.len(), 5);
        assert_eq!(head.get(0).unwrap(), base.get(0).unwrap());
        assert_eq!(head.get(4).unwrap(), base.get(4).unwrap());
        assert_eq!(tail.get(0).unwrap(), base.get(5).unwrap());
        assert_eq!(tail.get(4).unwrap(), base.get(9).unwrap());
        assert!(head.get(5).is_err());
    }

    #[test]
    fn slice_boundaries_round_half_to_even() {
        let base = counted("base", 10);
        // 0.05 * 10 == 0.5 rounds down to the even boundary 0.
        let slice = CorpusSlice::new(base.clone(), 0.05, 1.0).unwrap();
        assert_eq!(slice.len(), 10);
        // 0.15 * 10 == 1.5 rounds up to the even boundary 2.
        let slice = CorpusSlice::new(base, 0.15, 1.0).unwrap();
        assert_eq!(slice.len(), 8);
        assert_eq!(slice.get(0).unwrap(), vec![2]);
    }

    #[test]
    fn inverted_and_out_of_range_slice_bounds_are_rejected() {
        let base = counted("base", 10);
        assert!(CorpusSlice::new(base.clone(), 0.6, 0.4).is_err());
        assert!(CorpusSlice::new(base.clone(), -0.1, 0.5).is_err());
        assert!(CorpusSlice::new(base.clone(), 0.0, 1.1).is_err());
        assert!(CorpusSlice::new(base, 0.5, 0.5).is_err());
    }

    #[test]
    fn slice_names_record_their_bounds() {
        let base = counted("base", 10);
        let slice = CorpusSlice::new(base.clone(), 0.0, 0.5).unwrap();
        assert_eq!(slice.name(), "base_0.0_0.5");
        // Integral bounds keep their fractional rendering.
        let slice = CorpusSlice::new(base, 0.25, 1.0).unwrap();
        assert_eq!(slice.name(), "base_0.25_1.0");
    }
}
