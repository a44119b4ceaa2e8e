use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for composition validation, sampling, and cache failures.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("configuration error at `{path}`: {reason}")]
    Configuration { path: String, reason: String },
    #[error("index {index} out of range for '{dataset}' (length {len})")]
    IndexOutOfRange {
        dataset: String,
        index: usize,
        len: usize,
    },
    #[error(
        "blend branch '{branch}' exhausted its oversampled pool \
         ({requested} requested, {available} available)"
    )]
    SupplyExhausted {
        branch: String,
        requested: usize,
        available: usize,
    },
    #[error("corpus provider failure: {0}")]
    Provider(String),
    #[error("timed out waiting for cache artifact {path:?} owned by rank {owner}")]
    CacheUnavailable { path: PathBuf, owner: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ComposeError {
    /// Shorthand for a construction-time validation failure at `path`.
    pub fn configuration(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
