//! Era alignment and forward-fill.
//!
//! Snapshots arrive on an irregular wall-clock grid; charts and scoring
//! need one value per era. Each observation is matched forward against
//! era *end* boundaries: it lands in the earliest era whose end lies at
//! or after the observation's score timestamp. Multiple observations in
//! one era resolve to the latest; unobserved eras inherit the nearest
//! preceding value. The boundary rule (exclusive end, offset by 1 ms)
//! must not be reinterpreted — downstream outputs match a legacy
//! pipeline that depends on it.

use chrono::{DateTime, Utc};
use erascore_types::{Era, EraInterval, EraScoreSeries, Snapshot, StashAddress};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Align one (validator, field) pair onto the era timeline.
///
/// A validator with zero observations yields an all-`None`, all-stale
/// series rather than an error; other validators still score.
pub fn align_field(
    snapshots: &[Snapshot],
    stash: &str,
    field: &str,
    timeline: &[EraInterval],
) -> EraScoreSeries {
    let observations = collect_observations(snapshots, stash, field);

    // Latest observation per era wins. Observations are sorted ascending
    // by timestamp, so a plain insert overwrites earlier ones.
    let mut raw: BTreeMap<Era, f64> = BTreeMap::new();
    for (instant, value) in &observations {
        if let Some(era) = assign_era(timeline, *instant) {
            raw.insert(era, *value);
        }
    }

    forward_fill(&raw, timeline)
}

/// Fan out alignment over every (validator, field) combination.
///
/// Per-validator work is pure, so rayon order cannot affect results;
/// reducing into `BTreeMap`s re-establishes deterministic output order
/// by field and stash.
pub fn align_all(
    snapshots: &[Snapshot],
    stashes: &[StashAddress],
    fields: &[String],
    timeline: &[EraInterval],
) -> BTreeMap<String, BTreeMap<StashAddress, EraScoreSeries>> {
    fields
        .iter()
        .map(|field| {
            let per_stash: BTreeMap<StashAddress, EraScoreSeries> = stashes
                .par_iter()
                .map(|stash| {
                    (
                        stash.clone(),
                        align_field(snapshots, stash, field, timeline),
                    )
                })
                .collect();
            (field.clone(), per_stash)
        })
        .collect()
}

/// (score_time, value) pairs for one validator and field, missing values
/// dropped, sorted ascending by timestamp. Duplicate timestamps collapse
/// to the record seen last in input order.
fn collect_observations(snapshots: &[Snapshot], stash: &str, field: &str) -> Vec<(DateTime<Utc>, f64)> {
    let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for snap in snapshots {
        if snap.stash != stash {
            continue;
        }
        if let Some(value) = snap.number(field) {
            if value.is_nan() {
                continue;
            }
            by_time.insert(snap.score_time, value);
        }
    }
    by_time.into_iter().collect()
}

/// Earliest era whose end boundary lies at or after `instant` (forward
/// as-of match). `None` when the instant falls beyond the last era's end.
fn assign_era(timeline: &[EraInterval], instant: DateTime<Utc>) -> Option<Era> {
    let idx = timeline.partition_point(|interval| interval.end < instant);
    timeline.get(idx).map(|interval| interval.era)
}

/// Explicit forward-fill scan over the full timeline. Eras before the
/// first raw value stay `None`; every later era takes the nearest
/// preceding raw value. Freshness marks only eras with a raw value.
fn forward_fill(raw: &BTreeMap<Era, f64>, timeline: &[EraInterval]) -> EraScoreSeries {
    let mut series = EraScoreSeries::default();
    let mut last: Option<f64> = None;
    for interval in timeline {
        let fresh = raw.contains_key(&interval.era);
        if fresh {
            last = raw.get(&interval.era).copied();
        }
        series.values.insert(interval.era, last);
        series.fresh.insert(interval.era, fresh);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::era_clock::EraClock;
    use chrono::{Duration, TimeZone};
    use erascore_types::FieldValue;
    use std::collections::HashMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    fn timeline() -> Vec<EraInterval> {
        EraClock::new(100, t0(), Duration::hours(6))
            .unwrap()
            .timeline(100..=103)
    }

    fn snap(stash: &str, field: &str, value: f64, score_offset: Duration) -> Snapshot {
        let mut fields = HashMap::new();
        fields.insert(field.to_string(), FieldValue::Number(value));
        Snapshot {
            stash: stash.to_string(),
            dump_time: t0() + score_offset + Duration::hours(1),
            score_time: t0() + score_offset,
            fields,
        }
    }

    #[test]
    fn observation_lands_in_era_containing_it() {
        // Era 100 ends at T0+6h-1ms, so an observation at T0+7h belongs
        // to era 101 and fills forward through 103.
        let snaps = vec![snap("v1", "score.inclusion", 50.0, Duration::hours(7))];
        let series = align_field(&snaps, "v1", "score.inclusion", &timeline());

        assert_eq!(series.value(100), None);
        assert_eq!(series.value(101), Some(50.0));
        assert_eq!(series.value(102), Some(50.0));
        assert_eq!(series.value(103), Some(50.0));
        assert!(!series.is_fresh(100));
        assert!(series.is_fresh(101));
        assert!(!series.is_fresh(102));
        assert!(!series.is_fresh(103));
    }

    #[test]
    fn boundary_instants_respect_exclusive_end() {
        let timeline = timeline();
        // Exactly at era 100's end: still era 100.
        let at_end = t0() + Duration::hours(6) - Duration::milliseconds(1);
        assert_eq!(assign_era(&timeline, at_end), Some(100));
        // One millisecond later is era 101's start.
        assert_eq!(assign_era(&timeline, at_end + Duration::milliseconds(1)), Some(101));
        // Beyond the last era's end: unassignable.
        let past = t0() + Duration::hours(24);
        assert_eq!(assign_era(&timeline, past), None);
    }

    #[test]
    fn latest_observation_per_era_wins() {
        let snaps = vec![
            snap("v1", "score.bonded", 10.0, Duration::hours(1)),
            snap("v1", "score.bonded", 30.0, Duration::hours(5)),
            snap("v1", "score.bonded", 20.0, Duration::hours(3)),
        ];
        let series = align_field(&snaps, "v1", "score.bonded", &timeline());
        assert_eq!(series.value(100), Some(30.0));
        assert!(series.is_fresh(100));
        // carried forward
        assert_eq!(series.value(103), Some(30.0));
        assert!(!series.is_fresh(103));
    }

    #[test]
    fn duplicate_timestamps_keep_last_record() {
        let mut early = snap("v1", "score.rank", 1.0, Duration::hours(2));
        let late = snap("v1", "score.rank", 2.0, Duration::hours(2));
        early.dump_time = t0(); // input order decides, not dump time
        let series = align_field(&[early, late], "v1", "score.rank", &timeline());
        assert_eq!(series.value(100), Some(2.0));
    }

    #[test]
    fn zero_observations_yield_no_data_series() {
        let snaps = vec![snap("other", "score.rank", 5.0, Duration::hours(1))];
        let series = align_field(&snaps, "v1", "score.rank", &timeline());
        assert_eq!(series.len(), 4);
        assert!(series.values.values().all(|v| v.is_none()));
        assert!(series.fresh.values().all(|fresh| !fresh));
    }

    #[test]
    fn missing_values_are_dropped_not_zeroed() {
        let mut with_null = snap("v1", "score.faults", 0.0, Duration::hours(1));
        with_null
            .fields
            .insert("score.faults".to_string(), FieldValue::Null);
        let series = align_field(&[with_null], "v1", "score.faults", &timeline());
        assert_eq!(series.value(100), None);
    }

    #[test]
    fn forward_fill_is_idempotent() {
        let snaps = vec![snap("v1", "score.bonded", 7.0, Duration::hours(1))];
        let timeline = timeline();
        let series = align_field(&snaps, "v1", "score.bonded", &timeline);
        assert!(series.is_total());

        let raw: BTreeMap<Era, f64> = series
            .values
            .iter()
            .filter_map(|(era, v)| v.map(|value| (*era, value)))
            .collect();
        let refilled = forward_fill(&raw, &timeline);
        assert_eq!(refilled.values, series.values);
    }

    #[test]
    fn align_all_orders_by_field_then_stash() {
        let snaps = vec![
            snap("v2", "score.rank", 1.0, Duration::hours(1)),
            snap("v1", "score.rank", 2.0, Duration::hours(1)),
        ];
        let stashes = vec!["v1".to_string(), "v2".to_string()];
        let fields = vec!["score.rank".to_string(), "score.bonded".to_string()];
        let aligned = align_all(&snaps, &stashes, &fields, &timeline());

        let field_order: Vec<&String> = aligned.keys().collect();
        assert_eq!(field_order, vec!["score.bonded", "score.rank"]);
        let stash_order: Vec<&String> = aligned["score.rank"].keys().collect();
        assert_eq!(stash_order, vec!["v1", "v2"]);
        assert_eq!(aligned["score.rank"]["v1"].value(100), Some(2.0));
        assert_eq!(aligned["score.rank"]["v2"].value(100), Some(1.0));
    }
}
