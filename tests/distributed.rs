//! Rank rotation and cache-artifact behavior across worker ranks.

use std::sync::Arc;
use std::thread;

use datamix::{
    CorpusConfig, DatasetConfig, DistributedContext, MemoryCorpus, SamplingConfig, SamplingContext,
    SamplingParameters,
};

fn leaf(name: &str, len: u32) -> CorpusConfig {
    CorpusConfig::leaf(Arc::new(MemoryCorpus::new(
        name,
        (0..len).map(|value| vec![value]).collect(),
    )))
}

fn context(rank: usize, world_size: usize, num_samples: usize) -> SamplingContext {
    SamplingContext::new(
        SamplingConfig::default(),
        SamplingParameters { num_samples },
        DistributedContext::new(rank, world_size).unwrap(),
        "train",
    )
}

fn collect(config: &DatasetConfig, context: &SamplingContext) -> Vec<Vec<u32>> {
    let stream = config.build_and_sample(context).unwrap();
    (0..stream.len())
        .map(|index| stream.get(index).unwrap())
        .collect()
}

#[test]
fn rank_rotation_is_shared_across_one_resolution_pass() {
    let context = context(0, 4, 10);
    let ranks: Vec<usize> = (0..8).map(|_| context.get_next_rank()).collect();
    assert_eq!(ranks, vec![0, 1, 2, 3, 0, 1, 2, 3]);
}

#[test]
fn resolution_order_does_not_depend_on_the_local_rank() {
    // Without a cache directory every rank computes its own orders; the
    // streams must still be identical because the rank never enters the
    // order derivation.
    let tree: DatasetConfig = leaf("a", 50).into();
    let on_rank0 = collect(&tree, &context(0, 2, 120));
    let on_rank1 = collect(&tree, &context(1, 2, 120));
    assert_eq!(on_rank0, on_rank1);
}

#[test]
fn owned_artifacts_are_persisted_and_reread() {
    let dir = tempfile::tempdir().unwrap();
    let tree: DatasetConfig = leaf("a", 50).into();

    // Rank 0 of 1 owns the single leaf, builds the artifact, and persists it.
    let first = collect(&tree, &context(0, 1, 120).with_cache_directory(dir.path()));
    let artifacts: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(
        artifacts[0].extension().and_then(|ext| ext.to_str()),
        Some("order")
    );

    // A later resolution resumes from the stored artifact bit-for-bit.
    let second = collect(&tree, &context(0, 1, 120).with_cache_directory(dir.path()));
    assert_eq!(first, second);
}

#[test]
fn non_owning_ranks_wait_for_the_owner_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let tree: DatasetConfig = leaf("a", 50).into();

    // The single leaf is owned by rank 0. Rank 1 polls for the artifact, so
    // it must be resolved concurrently with the owner.
    let handles: Vec<_> = (0..2)
        .map(|rank| {
            let tree = tree.clone();
            let context = context(rank, 2, 120).with_cache_directory(dir.path());
            thread::spawn(move || collect(&tree, &context))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(results[0], results[1]);
}

#[test]
fn blend_leaf_ownership_rotates_across_ranks() {
    let dir = tempfile::tempdir().unwrap();
    let tree = DatasetConfig::blended(
        "mix",
        vec![leaf("a", 400).into(), leaf("b", 400).into()],
        vec![0.5, 0.5],
        false,
    )
    .unwrap();

    // With two leaves and two ranks each rank owns one artifact, so both
    // ranks must run concurrently for either to finish.
    let handles: Vec<_> = (0..2)
        .map(|rank| {
            let tree = tree.clone();
            let context = context(rank, 2, 500).with_cache_directory(dir.path());
            thread::spawn(move || collect(&tree, &context))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(results[0], results[1]);
    let artifacts = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(artifacts, 2);
}
