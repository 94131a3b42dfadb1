//! Empirical quantiles and inverted clip-normalization.
//!
//! Scores derived from population frequencies reward rarity: a raw value
//! at or below the low quantile cut earns the full weight, one at or
//! above the high cut earns zero, and values in between interpolate
//! linearly downward.

use crate::errors::{EngineError, Result};

/// Linear-interpolation empirical quantile over `values` at level `q`.
/// Matches the conventional "linear" method: rank `h = (n-1)q`,
/// interpolated between the neighbouring order statistics.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    if !(0.0..=1.0).contains(&q) || !q.is_finite() {
        return Err(EngineError::InvalidQuantileLevel(q));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64))
}

/// Quantile-bounded inverted normalization into `[0, weight]`.
///
/// With `low_val = quantile(values, low_q)` and `high_val =
/// quantile(values, high_q)`:
///   - `v <= low_val`  → `weight` (rare values score high),
///   - `v >= high_val` → `0`,
///   - otherwise       → `(1 - (v - low_val) / (high_val - low_val)) * weight`.
///
/// When the cuts collapse (`high_val == low_val`), values at or below the
/// cut take the full weight and values above take zero; the interpolation
/// branch is unreachable, so no division by zero occurs.
pub fn normalize_inverted(values: &[f64], low_q: f64, high_q: f64, weight: f64) -> Result<Vec<f64>> {
    if weight < 0.0 || !weight.is_finite() {
        return Err(EngineError::NegativeWeight(weight));
    }
    if low_q >= high_q {
        return Err(EngineError::InvalidQuantileBounds {
            low: low_q,
            high: high_q,
        });
    }

    let low_val = quantile(values, low_q)?;
    let high_val = quantile(values, high_q)?;

    let scores = values
        .iter()
        .map(|&v| {
            if v <= low_val {
                weight
            } else if v >= high_val {
                0.0
            } else {
                (1.0 - (v - low_val) / (high_val - low_val)) * weight
            }
        })
        .collect();
    Ok(scores)
}

/// Round to two decimals, the precision reported in score tables.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
