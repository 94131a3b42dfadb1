//! Per-era score series for one (validator, field) pair.

use crate::Era;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Era-indexed score history for one validator and one score field.
///
/// The series is total over the aligned era range: every era between the
/// first and last timeline era has an entry. `None` is the explicit
/// "no data" sentinel for eras preceding the first observation; it is
/// never collapsed to zero. `fresh` is `true` only for eras that
/// contained at least one raw observation (as opposed to a value carried
/// forward from an earlier era).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EraScoreSeries {
    pub values: BTreeMap<Era, Option<f64>>,
    pub fresh: BTreeMap<Era, bool>,
}

impl EraScoreSeries {
    /// Value at `era`, flattened: `None` for out-of-range eras and for
    /// in-range eras with no data yet.
    pub fn value(&self, era: Era) -> Option<f64> {
        self.values.get(&era).copied().flatten()
    }

    /// Whether `era` held a raw observation (not a forward-filled value).
    pub fn is_fresh(&self, era: Era) -> bool {
        self.fresh.get(&era).copied().unwrap_or(false)
    }

    /// First era with an actual value, if any observation exists.
    pub fn first_observed(&self) -> Option<Era> {
        self.values
            .iter()
            .find(|(_, v)| v.is_some())
            .map(|(era, _)| *era)
    }

    /// True when every era in the range carries a value.
    pub fn is_total(&self) -> bool {
        self.values.values().all(|v| v.is_some())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
