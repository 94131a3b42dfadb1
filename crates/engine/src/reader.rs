//! Snapshot and on-chain dump merging.
//!
//! Inputs arrive as irregular, overlapping dumps: hourly backend
//! snapshots and periodic era-reward queries that may re-report an era
//! that had not closed yet. This module flattens them into single
//! chronologically ordered tables with well-defined deduplication.

use crate::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use erascore_config::NetworkConfig;
use erascore_types::{Era, EraPoints, Snapshot, StashAddress};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Merge snapshot dumps into one table sorted by dump time, keeping only
/// records at or after `cutoff`. Fails when nothing survives the cutoff;
/// an empty population cannot be scored.
pub fn merge_snapshots(
    snapshots: Vec<Snapshot>,
    cutoff: Option<DateTime<Utc>>,
) -> Result<Vec<Snapshot>> {
    let mut merged: Vec<Snapshot> = match cutoff {
        Some(cutoff) => snapshots
            .into_iter()
            .filter(|snap| snap.dump_time >= cutoff)
            .collect(),
        None => snapshots,
    };
    if merged.is_empty() {
        return Err(EngineError::NoSnapshots);
    }
    merged.sort_by_key(|snap| snap.dump_time);
    Ok(merged)
}

/// One snapshot per validator: the row with the maximum dump time, ties
/// broken by keeping the last occurrence in stable input order. Output
/// is ordered by stash address.
pub fn latest_per_validator(snapshots: &[Snapshot]) -> Vec<Snapshot> {
    let mut latest: BTreeMap<&str, &Snapshot> = BTreeMap::new();
    for snap in snapshots {
        match latest.get(snap.stash.as_str()) {
            Some(existing) if existing.dump_time > snap.dump_time => {}
            _ => {
                latest.insert(snap.stash.as_str(), snap);
            }
        }
    }
    latest.into_values().cloned().collect()
}

/// Like [`latest_per_validator`], but rows missing any configured score
/// field are dropped before selecting the newest. A validator whose most
/// recent dump is partial falls back to its newest complete row instead
/// of losing its place in the scored population.
pub fn latest_scorable_per_validator(
    snapshots: &[Snapshot],
    config: &NetworkConfig,
) -> Vec<Snapshot> {
    let complete: Vec<Snapshot> = snapshots
        .iter()
        .filter(|snap| has_all_score_fields(snap, config))
        .cloned()
        .collect();
    latest_per_validator(&complete)
}

fn has_all_score_fields(snap: &Snapshot, config: &NetworkConfig) -> bool {
    config.fields.keys().all(|name| {
        // Location and provider sub-scores are recomputed from the
        // population, not read from the snapshot.
        matches!(name.as_str(), "location" | "provider")
            || snap.number(&NetworkConfig::score_key(name)).is_some()
    })
}

/// The set of validator addresses present in the snapshot table.
pub fn validator_universe(snapshots: &[Snapshot]) -> BTreeSet<StashAddress> {
    snapshots.iter().map(|snap| snap.stash.clone()).collect()
}

/// Merge overlapping era-reward dumps. When the same (address, era) pair
/// appears more than once, keep the row with the maximum points: a dump
/// taken before the era closed reports partial points that a later dump
/// supersedes. Output is sorted by (address, era).
pub fn merge_era_points(rows: Vec<EraPoints>) -> Vec<EraPoints> {
    let mut best: BTreeMap<(StashAddress, Era), EraPoints> = BTreeMap::new();
    for row in rows {
        let key = (row.address.clone(), row.era);
        match best.get(&key) {
            Some(existing)
                if existing.points.unwrap_or(f64::NEG_INFINITY)
                    >= row.points.unwrap_or(f64::NEG_INFINITY) => {}
            _ => {
                best.insert(key, row);
            }
        }
    }
    best.into_values().collect()
}

/// Eras missing from the observed on-chain sequence. Eras form a
/// contiguous run once observed, so a hole is an anomaly worth flagging;
/// it is reported and the computation proceeds over the eras present.
pub fn era_gaps(rows: &[EraPoints]) -> Vec<Era> {
    let observed: BTreeSet<Era> = rows.iter().map(|row| row.era).collect();
    let (Some(&min), Some(&max)) = (observed.iter().next(), observed.iter().next_back()) else {
        return Vec::new();
    };
    let missing: Vec<Era> = (min..=max).filter(|era| !observed.contains(era)).collect();
    if !missing.is_empty() {
        warn!(?missing, "gap detected in observed on-chain era sequence");
    }
    missing
}

/// Observed era range of the reward table, for building the timeline.
pub fn era_range(rows: &[EraPoints]) -> Result<(Era, Era)> {
    let eras: BTreeSet<Era> = rows.iter().map(|row| row.era).collect();
    match (eras.iter().next(), eras.iter().next_back()) {
        (Some(&min), Some(&max)) => Ok((min, max)),
        _ => Err(EngineError::NoEraPoints),
    }
}

/// Sliding-window activity percentage. For every address and every
/// window-end era in `[min_era + delta, max_era]`, the fraction of the
/// last `delta` eras with a reward row for that address. The earliest
/// window end is `min_era + delta`, not `min_era + delta - 1`; the
/// published tables never carried the window anchored exactly at the
/// range start, and downstream comparisons expect that endpoint.
pub fn inclusion_percentage(
    rows: &[EraPoints],
    delta: u64,
) -> Result<BTreeMap<StashAddress, BTreeMap<Era, f64>>> {
    if delta == 0 {
        return Err(EngineError::InvalidWindow(delta));
    }
    let (min_era, max_era) = era_range(rows)?;

    let mut active: BTreeMap<&str, BTreeSet<Era>> = BTreeMap::new();
    for row in rows {
        active.entry(row.address.as_str()).or_default().insert(row.era);
    }

    let mut result = BTreeMap::new();
    for (address, eras) in active {
        let mut windows = BTreeMap::new();
        let mut end_era = max_era;
        while end_era >= min_era.saturating_add(delta) {
            let window_start = end_era + 1 - delta;
            let hits = eras.range(window_start..=end_era).count();
            windows.insert(end_era, hits as f64 / delta as f64);
            end_era -= 1;
        }
        result.insert(address.to_string(), windows);
    }
    Ok(result)
}
