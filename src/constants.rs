/// Constants used by sampling defaults and seed handling.
pub mod sampling {
    /// Default seed for deterministic sampling.
    pub const DEFAULT_SEED: u64 = 784_569;
}

/// Constants used by the weighted blend engine.
pub mod blend {
    /// Seed stride between blend branches; a large odd constant that
    /// decorrelates neighboring branch seeds.
    pub const BRANCH_SEED_STRIDE: u64 = 697;
    /// Standard-deviation multiple in the legacy oversampling margin.
    pub const LEGACY_MARGIN_SIGMAS: f64 = 5.0;
}

/// Constants used by the persisted sample-order cache artifact.
pub mod cache {
    /// Version tag for persisted sample-order payloads.
    pub const ORDER_RECORD_VERSION: u8 = 1;
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// File extension for persisted sample-order artifacts.
    pub const ORDER_FILE_EXTENSION: &str = "order";
    /// Suffix for in-progress artifact writes before the atomic rename.
    pub const ORDER_TMP_SUFFIX: &str = ".tmp";
    /// Interval between polls while waiting for another rank's artifact.
    pub const POLL_INTERVAL_MS: u64 = 50;
    /// Maximum total wait for another rank's artifact.
    pub const POLL_TIMEOUT_MS: u64 = 300_000;
}
