//! Era identifiers and on-chain era observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Era identifier: a non-negative index into the chain's fixed-duration epochs.
pub type Era = u64;

/// Derived wall-clock interval of one era. The end boundary is exclusive,
/// encoded as the start of the next era minus one millisecond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraInterval {
    pub era: Era,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EraInterval {
    /// Whether `instant` falls inside this era's wall-clock window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// One observed (era, start time) pair reported by the chain's active-era
/// storage. Only the current era's start is exposed reliably, so these
/// accumulate one row per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraStart {
    pub era: Era,
    pub start: DateTime<Utc>,
}

/// One on-chain reward-points row for a validator in an era. Points can be
/// absent when the chain reported the validator without a score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EraPoints {
    pub address: crate::StashAddress,
    pub era: Era,
    pub points: Option<f64>,
}
