//! Numeric helpers for blend weights and slice boundaries.

use crate::errors::ComposeError;

/// Normalize non-negative weights so they sum to 1, preserving ratios.
///
/// `path` names the configuration field being validated and is reported in
/// the error when a weight is negative or the sum is not positive.
pub fn normalize_weights(weights: &[f64], path: &str) -> Result<Vec<f64>, ComposeError> {
    for (index, weight) in weights.iter().enumerate() {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ComposeError::configuration(
                format!("{path}[{index}]"),
                format!("weight must be finite and non-negative, got {weight}"),
            ));
        }
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(ComposeError::configuration(
            path,
            format!("weights must have a positive sum, got {sum}"),
        ));
    }
    Ok(weights.iter().map(|weight| weight / sum).collect())
}

/// Round to the nearest integer, breaking exact halves toward the even
/// neighbor (banker's rounding).
///
/// Slice boundaries use this rule as a pinned contract: `f64::round` breaks
/// halves away from zero, which would shift exact split points such as
/// `0.05 * 10`.
pub fn round_half_even(value: f64) -> usize {
    debug_assert!(value >= 0.0);
    let floor = value.floor();
    let fraction = value - floor;
    let base = floor as usize;
    if fraction > 0.5 {
        base + 1
    } else if fraction < 0.5 {
        base
    } else if base % 2 == 0 {
        base
    } else {
        base + 1
    }
}
