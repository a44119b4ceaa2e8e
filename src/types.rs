/// Raw sample payload as supplied by a corpus provider (opaque token ids).
/// Example: `vec![17, 3089, 12, 404]`
pub type RawSample = Vec<u32>;
/// Human-readable dataset identifier used in stream names, errors, and cache keys.
/// Examples: `train`, `pretrain_mix`, `web_0.0_0.9`
pub type DatasetName = String;
