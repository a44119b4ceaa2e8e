//! Declarative dataset-composition trees.
//!
//! A tree is assembled from validated nodes and later resolved against a
//! `SamplingContext`. The node kinds are private enums behind `CorpusConfig`
//! and `DatasetConfig`, so a tree can only be produced through the factory
//! constructors and is therefore valid by construction: every error a tree
//! can report at resolution time concerns the data, never the shape of the
//! configuration.
//!
//! `CorpusConfig` nodes resolve to an `IndexedCorpus` and may appear under
//! any node; `DatasetConfig` nodes resolve to a `SampledStream` and form the
//! outer layer, since blending operates on streams rather than corpora.

use std::fmt;
use std::sync::Arc;

use crate::blend::{BlendedStream, branch_seed_offset, oversampled_count};
use crate::config::{SamplingOverrides, SamplingParameters};
use crate::context::SamplingContext;
use crate::corpus::{
    ConcatenatedCorpus, CorpusProvider, CorpusSlice, IndexedCorpus, validate_slice_range,
};
use crate::errors::ComposeError;
use crate::stream::{SampledStream, ShuffledStream};
use crate::utils::normalize_weights;

/// Composition node that resolves to an indexed corpus.
#[derive(Clone)]
pub struct CorpusConfig {
    kind: CorpusKind,
}

#[derive(Clone)]
enum CorpusKind {
    Leaf(Arc<dyn CorpusProvider>),
    Concatenated {
        name: String,
        datasets: Vec<CorpusConfig>,
    },
    Sliced {
        dataset: Box<CorpusConfig>,
        begin: f64,
        end: f64,
    },
}

impl CorpusConfig {
    /// Wrap a corpus provider as a leaf node.
    pub fn leaf(provider: Arc<dyn CorpusProvider>) -> Self {
        Self {
            kind: CorpusKind::Leaf(provider),
        }
    }

    /// Concatenate `datasets` end-to-end under `name`.
    pub fn concatenated(
        name: impl Into<String>,
        datasets: Vec<CorpusConfig>,
    ) -> Result<Self, ComposeError> {
        if datasets.is_empty() {
            return Err(ComposeError::configuration(
                "concatenated.datasets",
                "at least one dataset is required",
            ));
        }
        Ok(Self {
            kind: CorpusKind::Concatenated {
                name: name.into(),
                datasets,
            },
        })
    }

    /// Restrict `dataset` to the fraction range `[begin, end)`.
    pub fn sliced(dataset: CorpusConfig, begin: f64, end: f64) -> Result<Self, ComposeError> {
        validate_slice_range(begin, end, "sliced")?;
        Ok(Self {
            kind: CorpusKind::Sliced {
                dataset: Box::new(dataset),
                begin,
                end,
            },
        })
    }

    /// Resolve this subtree into an indexed corpus.
    pub fn build(&self, context: &SamplingContext) -> Result<Arc<dyn IndexedCorpus>, ComposeError> {
        match &self.kind {
            CorpusKind::Leaf(provider) => provider.build(context),
            CorpusKind::Concatenated { name, datasets } => {
                let corpora = datasets
                    .iter()
                    .map(|dataset| dataset.build(context))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(ConcatenatedCorpus::new(name.clone(), corpora)?))
            }
            CorpusKind::Sliced {
                dataset,
                begin,
                end,
            } => Ok(Arc::new(CorpusSlice::new(
                dataset.build(context)?,
                *begin,
                *end,
            )?)),
        }
    }
}

impl fmt::Debug for CorpusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CorpusKind::Leaf(provider) => {
                f.debug_tuple("Leaf").field(&provider.name()).finish()
            }
            CorpusKind::Concatenated { name, datasets } => f
                .debug_struct("Concatenated")
                .field("name", name)
                .field("datasets", datasets)
                .finish(),
            CorpusKind::Sliced {
                dataset,
                begin,
                end,
            } => f
                .debug_struct("Sliced")
                .field("dataset", dataset)
                .field("begin", begin)
                .field("end", end)
                .finish(),
        }
    }
}

/// Composition node that resolves to a sampled stream.
#[derive(Clone)]
pub struct DatasetConfig {
    kind: DatasetKind,
}

#[derive(Clone)]
enum DatasetKind {
    Corpus(CorpusConfig),
    Blended {
        name: String,
        datasets: Vec<DatasetConfig>,
        weights: Vec<f64>,
        legacy: bool,
    },
    Overridden {
        overrides: SamplingOverrides,
        dataset: Box<DatasetConfig>,
    },
}

impl DatasetConfig {
    /// Blend `datasets` to the target proportions in `weights`.
    ///
    /// Weights are normalized at construction; `legacy` selects the
    /// randomized interleaving scheme kept for order compatibility with
    /// runs produced before the exact scheme existed.
    pub fn blended(
        name: impl Into<String>,
        datasets: Vec<DatasetConfig>,
        weights: Vec<f64>,
        legacy: bool,
    ) -> Result<Self, ComposeError> {
        if datasets.len() < 2 {
            return Err(ComposeError::configuration(
                "blended.datasets",
                format!("at least two datasets are required, got {}", datasets.len()),
            ));
        }
        if weights.len() != datasets.len() {
            return Err(ComposeError::configuration(
                "blended.weights",
                format!(
                    "expected one weight per dataset ({}), got {}",
                    datasets.len(),
                    weights.len()
                ),
            ));
        }
        let weights = normalize_weights(&weights, "blended.weights")?;
        Ok(Self {
            kind: DatasetKind::Blended {
                name: name.into(),
                datasets,
                weights,
                legacy,
            },
        })
    }

    /// Apply a sampling-config patch to every node under `dataset`.
    pub fn overridden(overrides: SamplingOverrides, dataset: DatasetConfig) -> Self {
        Self {
            kind: DatasetKind::Overridden {
                overrides,
                dataset: Box::new(dataset),
            },
        }
    }

    /// Resolve this tree into a sampled stream of
    /// `context.parameters().num_samples` samples.
    pub fn build_and_sample(
        &self,
        context: &SamplingContext,
    ) -> Result<Arc<dyn SampledStream>, ComposeError> {
        match &self.kind {
            DatasetKind::Corpus(config) => {
                let corpus = config.build(context)?;
                Ok(Arc::new(ShuffledStream::sample(corpus, context)?))
            }
            DatasetKind::Blended {
                name,
                datasets,
                weights,
                legacy,
            } => {
                let num_samples = context.parameters().num_samples;
                let branches = datasets
                    .iter()
                    .zip(weights)
                    .enumerate()
                    .map(|(index, (dataset, weight))| {
                        // Each branch samples an oversized pool under a
                        // decorrelated seed; the blend then consumes pool
                        // prefixes according to the assignment table.
                        let branch_context = context
                            .with_config(
                                context
                                    .config()
                                    .with_seed_offset(branch_seed_offset(index, *legacy)),
                            )
                            .with_parameters(SamplingParameters {
                                num_samples: oversampled_count(*weight, num_samples, *legacy),
                            });
                        dataset.build_and_sample(&branch_context)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(BlendedStream::new(
                    name.clone(),
                    branches,
                    weights,
                    context,
                    *legacy,
                )?))
            }
            DatasetKind::Overridden { overrides, dataset } => {
                dataset.build_and_sample(&context.with_overrides(overrides))
            }
        }
    }
}

impl From<CorpusConfig> for DatasetConfig {
    fn from(config: CorpusConfig) -> Self {
        Self {
            kind: DatasetKind::Corpus(config),
        }
    }
}

impl fmt::Debug for DatasetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatasetKind::Corpus(config) => f.debug_tuple("Corpus").field(config).finish(),
            DatasetKind::Blended {
                name,
                datasets,
                weights,
                legacy,
            } => f
                .debug_struct("Blended")
                .field("name", name)
                .field("datasets", datasets)
                .field("weights", weights)
                .field("legacy", legacy)
                .finish(),
            DatasetKind::Overridden { overrides, dataset } => f
                .debug_struct("Overridden")
                .field("overrides", overrides)
                .field("dataset", dataset)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::context::DistributedContext;
    use crate::corpus::MemoryCorpus;

    fn leaf(name: &str, len: u32) -> CorpusConfig {
        CorpusConfig::leaf(Arc::new(MemoryCorpus::new(
            name,
            (0..len).map(|value| vec![value]).collect(),
        )))
    }

    fn context(num_samples: usize) -> SamplingContext {
        SamplingContext::new(
            SamplingConfig::default(),
            SamplingParameters { num_samples },
            DistributedContext::single(),
            "test",
        )
    }

    #[test]
    fn malformed_trees_are_rejected_at_construction() {
        assert!(matches!(
            CorpusConfig::concatenated("merged", Vec::new()),
            Err(ComposeError::Configuration { ref path, .. }) if path == "concatenated.datasets"
        ));
        assert!(CorpusConfig::sliced(leaf("a", 10), 0.9, 0.1).is_err());
        assert!(matches!(
            DatasetConfig::blended("mix", vec![leaf("a", 10).into()], vec![1.0], false),
            Err(ComposeError::Configuration { ref path, .. }) if path == "blended.datasets"
        ));
        assert!(matches!(
            DatasetConfig::blended(
                "mix",
                vec![leaf("a", 10).into(), leaf("b", 10).into()],
                vec![1.0],
                false,
            ),
            Err(ComposeError::Configuration { ref path, .. }) if path == "blended.weights"
        ));
        assert!(
            DatasetConfig::blended(
                "mix",
                vec![leaf("a", 10).into(), leaf("b", 10).into()],
                vec![1.0, -1.0],
                false,
            )
            .is_err()
        );
    }

    #[test]
    fn nested_corpus_trees_resolve_bottom_up() {
        let tree = CorpusConfig::sliced(
            CorpusConfig::concatenated("merged", vec![leaf("a", 10), leaf("b", 10)]).unwrap(),
            0.0,
            0.5,
        )
        .unwrap();

        let corpus = tree.build(&context(0)).unwrap();
        assert_eq!(corpus.len(), 10);
        assert_eq!(corpus.name(), "merged_0.0_0.5");
        assert_eq!(corpus.get(9).unwrap(), vec![9]);
    }

    #[test]
    fn corpus_trees_sample_into_shuffled_streams() {
        let stream = DatasetConfig::from(leaf("a", 10))
            .build_and_sample(&context(25))
            .unwrap();
        assert_eq!(stream.len(), 25);
        stream.get(24).unwrap();
    }

    #[test]
    fn overrides_change_the_sample_order() {
        let ordered = |config: DatasetConfig| {
            let stream = config.build_and_sample(&context(20)).unwrap();
            (0..20).map(|index| stream.get(index).unwrap()).collect::<Vec<_>>()
        };

        let base = ordered(leaf("a", 10).into());
        let same = ordered(leaf("a", 10).into());
        let reseeded = ordered(DatasetConfig::overridden(
            SamplingOverrides::seed(1),
            leaf("a", 10).into(),
        ));

        assert_eq!(base, same);
        assert_ne!(base, reseeded);
    }

    #[test]
    fn blends_resolve_branches_and_hit_target_proportions() {
        // Disjoint value ranges make the originating branch recoverable
        // from each sample.
        let first = CorpusConfig::leaf(Arc::new(MemoryCorpus::new(
            "a",
            (0..800u32).map(|value| vec![value]).collect(),
        )));
        let second = CorpusConfig::leaf(Arc::new(MemoryCorpus::new(
            "b",
            (10_000..10_300u32).map(|value| vec![value]).collect(),
        )));
        let tree = DatasetConfig::blended(
            "mix",
            vec![first.into(), second.into()],
            vec![3.0, 1.0],
            false,
        )
        .unwrap();

        let stream = tree.build_and_sample(&context(1000)).unwrap();
        assert_eq!(stream.len(), 1000);

        let mut from_first = 0;
        for index in 0..stream.len() {
            if stream.get(index).unwrap()[0] < 10_000 {
                from_first += 1;
            }
        }
        assert_eq!(from_first, 750);
    }

    #[test]
    fn blended_corpus_configs_convert_into_dataset_configs() {
        let config: DatasetConfig = leaf("a", 10).into();
        assert!(matches!(config.kind, DatasetKind::Corpus(_)));
    }
}
