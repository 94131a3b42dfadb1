//! Backend score-delay diagnostics.
//!
//! The backend computes scores on its own schedule, so a snapshot's dump
//! time can trail the score timestamp it carries by hours. Per era this
//! module reports the optimistic (minimum) delay per validator and a
//! quantile summary across the population. Purely informational.

use crate::era_clock::EraClock;
use crate::errors::Result;
use crate::quantile::quantile;
use erascore_types::{Era, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantile levels reported in the delay summary.
pub const DELAY_QUANTILE_LEVELS: [f64; 5] = [0.9, 0.75, 0.5, 0.25, 0.1];

/// Minimum observed delay for one validator in one era, in hours.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayRow {
    pub stash: String,
    pub era: Era,
    pub hours: f64,
}

/// One quantile of the per-era delay distribution, in hours.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayQuantile {
    pub era: Era,
    pub level: f64,
    pub hours: f64,
}

/// Per-era, per-validator minimum `dump_time - score_time` delay plus a
/// population quantile summary. Snapshots are bucketed into the era
/// whose window contains their dump time; snapshots outside the clock's
/// range of `eras` are ignored.
pub fn score_backend_delay(
    snapshots: &[Snapshot],
    clock: &EraClock,
    eras: std::ops::RangeInclusive<Era>,
) -> Result<(Vec<DelayRow>, Vec<DelayQuantile>)> {
    let timeline = clock.timeline(eras);

    let mut min_delay: BTreeMap<(Era, &str), f64> = BTreeMap::new();
    for snap in snapshots {
        let Some(interval) = timeline.iter().find(|iv| iv.contains(snap.dump_time)) else {
            continue;
        };
        let hours = (snap.dump_time - snap.score_time).num_milliseconds() as f64 / 3_600_000.0;
        min_delay
            .entry((interval.era, snap.stash.as_str()))
            .and_modify(|current| *current = current.min(hours))
            .or_insert(hours);
    }

    let mut rows = Vec::with_capacity(min_delay.len());
    let mut per_era: BTreeMap<Era, Vec<f64>> = BTreeMap::new();
    for ((era, stash), hours) in min_delay {
        rows.push(DelayRow {
            stash: stash.to_string(),
            era,
            hours,
        });
        per_era.entry(era).or_default().push(hours);
    }

    let mut quantiles = Vec::new();
    for (era, delays) in per_era {
        for level in DELAY_QUANTILE_LEVELS {
            quantiles.push(DelayQuantile {
                era,
                level,
                hours: quantile(&delays, level)?,
            });
        }
    }
    Ok((rows, quantiles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    fn snap(stash: &str, dump_offset: Duration, delay: Duration) -> Snapshot {
        Snapshot {
            stash: stash.to_string(),
            dump_time: t0() + dump_offset,
            score_time: t0() + dump_offset - delay,
            fields: HashMap::new(),
        }
    }

    #[test]
    fn minimum_delay_per_validator_per_era() {
        let clock = EraClock::new(100, t0(), Duration::hours(6)).unwrap();
        let snaps = vec![
            snap("v1", Duration::hours(1), Duration::hours(4)),
            snap("v1", Duration::hours(2), Duration::hours(2)),
            snap("v1", Duration::hours(7), Duration::hours(5)), // era 101
            snap("v2", Duration::hours(1), Duration::hours(1)),
        ];
        let (rows, quantiles) = score_backend_delay(&snaps, &clock, 100..=101).unwrap();

        assert_eq!(rows.len(), 3);
        let v1_era100 = rows
            .iter()
            .find(|row| row.stash == "v1" && row.era == 100)
            .unwrap();
        assert!((v1_era100.hours - 2.0).abs() < 1e-9);

        let median_era100 = quantiles
            .iter()
            .find(|q| q.era == 100 && q.level == 0.5)
            .unwrap();
        // era 100 delays: v1 -> 2h, v2 -> 1h
        assert!((median_era100.hours - 1.5).abs() < 1e-9);
        assert_eq!(
            quantiles.iter().filter(|q| q.era == 101).count(),
            DELAY_QUANTILE_LEVELS.len()
        );
    }

    #[test]
    fn snapshots_outside_range_are_ignored() {
        let clock = EraClock::new(100, t0(), Duration::hours(6)).unwrap();
        let snaps = vec![snap("v1", Duration::hours(30), Duration::hours(1))];
        let (rows, quantiles) = score_backend_delay(&snaps, &clock, 100..=101).unwrap();
        assert!(rows.is_empty());
        assert!(quantiles.is_empty());
    }
}
