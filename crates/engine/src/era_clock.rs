//! Era boundary arithmetic.
//!
//! The chain reliably exposes only the *current* era's start time, so all
//! other boundaries are derived from one (era, start) anchor plus the
//! fixed era duration. Real era lengths drift slightly; the resulting
//! error is measured against independently observed starts and reported
//! as a diagnostic, never treated as fatal.

use crate::errors::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};
use erascore_types::{Era, EraInterval, EraStart};
use std::ops::RangeInclusive;
use tracing::info;

/// Maps era numbers to derived wall-clock intervals.
#[derive(Clone, Copy, Debug)]
pub struct EraClock {
    anchor_era: Era,
    anchor_start: DateTime<Utc>,
    duration: Duration,
}

impl EraClock {
    /// Build a clock from one known (era, start) pair and the fixed era
    /// duration. Fails on non-positive durations.
    pub fn new(anchor_era: Era, anchor_start: DateTime<Utc>, duration: Duration) -> Result<Self> {
        if duration <= Duration::zero() {
            return Err(EngineError::InvalidEraDuration(duration.num_seconds()));
        }
        Ok(Self {
            anchor_era,
            anchor_start,
            duration,
        })
    }

    /// Anchor the clock on the earliest observed on-chain era start.
    pub fn from_observed(observed: &[EraStart], duration: Duration) -> Result<Self> {
        let earliest = observed
            .iter()
            .min_by_key(|row| row.era)
            .ok_or(EngineError::NoEraPoints)?;
        Self::new(earliest.era, earliest.start, duration)
    }

    /// Derived start of era `era`: anchor plus the signed era offset.
    pub fn start(&self, era: Era) -> DateTime<Utc> {
        let offset = era as i64 - self.anchor_era as i64;
        self.anchor_start + self.duration * offset as i32
    }

    /// Derived end of era `era`. Exclusive boundary: one millisecond
    /// before the next era starts.
    pub fn end(&self, era: Era) -> DateTime<Utc> {
        self.start(era + 1) - Duration::milliseconds(1)
    }

    pub fn interval(&self, era: Era) -> EraInterval {
        EraInterval {
            era,
            start: self.start(era),
            end: self.end(era),
        }
    }

    /// Ordered intervals for every era in `range`.
    pub fn timeline(&self, range: RangeInclusive<Era>) -> Vec<EraInterval> {
        range.map(|era| self.interval(era)).collect()
    }

    /// Mean absolute difference, in seconds, between derived era starts
    /// and independently observed ones. Informational only: the constant
    /// era-length assumption accrues bounded error over long windows.
    /// Returns `None` when there is nothing to compare against.
    pub fn drift_seconds(&self, observed: &[EraStart]) -> Option<f64> {
        if observed.is_empty() {
            return None;
        }
        let total: f64 = observed
            .iter()
            .map(|row| {
                let derived = self.start(row.era);
                (row.start - derived).num_milliseconds().abs() as f64 / 1_000.0
            })
            .sum();
        let avg = total / observed.len() as f64;
        info!(
            eras = observed.len(),
            avg_abs_error_secs = avg,
            "era clock drift against observed starts"
        );
        Some(avg)
    }
}
