//! erascore scoring engine
//!
//! Turns irregular, wall-clock-timestamped validator snapshots into
//! continuous, era-indexed score histories and a weighted total score
//! per validator:
//! - era boundary arithmetic from one on-chain anchor ([`era_clock`])
//! - snapshot and era-reward dump merging ([`reader`])
//! - era alignment with forward-fill ([`align`])
//! - quantile-bounded normalization ([`quantile`])
//! - weighted aggregation with blacklist override ([`aggregate`])
//! - backend score-delay diagnostics ([`delay`])
//!
//! The engine is batch and offline: every run recomputes from the full
//! snapshot history. Configuration problems fail fast before any
//! computation; per-validator data gaps never fail the batch.

pub mod aggregate;
pub mod align;
pub mod delay;
pub mod era_clock;
pub mod errors;
pub mod quantile;
pub mod reader;

pub use aggregate::{frequency_table, score_validators, FrequencyRow, ScoreReport, ValidatorScore};
pub use align::{align_all, align_field};
pub use delay::{score_backend_delay, DelayQuantile, DelayRow};
pub use era_clock::EraClock;
pub use errors::EngineError;
pub use quantile::{normalize_inverted, quantile};
pub use reader::{
    era_gaps, era_range, inclusion_percentage, latest_per_validator,
    latest_scorable_per_validator, merge_era_points, merge_snapshots, validator_universe,
};

/// Module version for API introspection
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
