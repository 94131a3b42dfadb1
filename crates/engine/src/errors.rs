use thiserror::Error;

/// Errors that can occur while aligning snapshots to eras and computing
/// scores. Per-validator data gaps are not errors; they surface as
/// explicit "no data" values in the output instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("era duration must be positive, got {0} seconds")]
    InvalidEraDuration(i64),

    #[error("no snapshots available at or after the cutoff; nothing to score")]
    NoSnapshots,

    #[error("no on-chain era rows available; cannot build the era timeline")]
    NoEraPoints,

    #[error("quantile level must lie in [0, 1], got {0}")]
    InvalidQuantileLevel(f64),

    #[error("quantile bounds must satisfy low < high, got ({low}, {high})")]
    InvalidQuantileBounds { low: f64, high: f64 },

    #[error("score weight must be non-negative, got {0}")]
    NegativeWeight(f64),

    #[error("cannot take a quantile of an empty series")]
    EmptySeries,

    #[error("sliding window must be at least one era, got {0}")]
    InvalidWindow(u64),

    #[error("field {0} has no entry in the network configuration")]
    UnconfiguredField(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
