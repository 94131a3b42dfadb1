//! Aggregate and total scoring over the latest snapshot per validator.
//!
//! Location and provider sub-scores are recomputed from the frequency of
//! each distinct string across the current population (rarer earns
//! more), the provider score is hard-zeroed for blacklisted providers,
//! and the weighted sum picks up a uniform random factor in [1, 1+r) to
//! break otherwise static ranking ties. The random source is injected so
//! tests can seed it; the nondeterministic total is intentional.

use crate::errors::{EngineError, Result};
use crate::quantile::{normalize_inverted, round2};
use chrono::{DateTime, Utc};
use erascore_config::NetworkConfig;
use erascore_types::{FieldValue, Snapshot};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Category used for empty attribute strings before counting.
pub const EMPTY_CATEGORY: &str = "(empty)";

/// One row of a shared-attribute frequency table (locations, providers).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub value: String,
    pub count: u64,
    pub score: f64,
    /// For provider rows: the provider is blacklisted. For other fields:
    /// every validator in this category runs on a blacklisted provider.
    pub blacklisted: bool,
}

/// Final per-validator scoring record.
///
/// Carries the full raw field map of the snapshot it was scored from
/// (rank, faults, commission, ...) alongside the derived scores, so
/// reports never have to re-join against the snapshot table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatorScore {
    pub stash: String,
    pub name: Option<String>,
    pub location: String,
    pub provider: String,
    pub dump_time: DateTime<Utc>,
    pub score_time: DateTime<Utc>,
    /// Every raw field of the scored snapshot, unmodified.
    pub fields: HashMap<String, FieldValue>,
    /// Weighted sub-score per non-meta field, in `[0, weight]`.
    pub sub_scores: BTreeMap<String, f64>,
    pub provider_blacklisted: bool,
    pub aggregate: f64,
    /// The random factor drawn for this run, kept for auditability.
    pub randomness: f64,
    pub total: f64,
}

/// Output of one scoring run over the latest-snapshot population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub scores: Vec<ValidatorScore>,
    pub location_table: Vec<FrequencyRow>,
    pub provider_table: Vec<FrequencyRow>,
}

/// Count distinct values of `field` over the population and score each
/// category through the quantile normalizer (rare categories score
/// high). Provider rows belonging to the blacklist get a zero score;
/// for other fields the blacklist flag is informational only, set when
/// every member of the category runs on a blacklisted provider.
pub fn frequency_table(
    latest: &[Snapshot],
    field: &str,
    config: &NetworkConfig,
) -> Result<Vec<FrequencyRow>> {
    let spec = config
        .fields
        .get(field)
        .ok_or_else(|| EngineError::UnconfiguredField(field.to_string()))?;

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut all_blacklisted: BTreeMap<String, bool> = BTreeMap::new();
    for snap in latest {
        let value = category(snap.text(field));
        let provider_blacklisted = config.blacklist.contains(&category(snap.text("provider")));
        *counts.entry(value.clone()).or_insert(0) += 1;
        all_blacklisted
            .entry(value)
            .and_modify(|flag| *flag &= provider_blacklisted)
            .or_insert(provider_blacklisted);
    }
    if counts.is_empty() {
        return Err(EngineError::EmptySeries);
    }

    let count_values: Vec<f64> = counts.values().map(|&count| count as f64).collect();
    let scores = normalize_inverted(&count_values, spec.low_q, spec.high_q, spec.weight)?;

    let mut rows: Vec<FrequencyRow> = counts
        .into_iter()
        .zip(scores)
        .map(|((value, count), score)| {
            let blacklisted = all_blacklisted.get(&value).copied().unwrap_or(false);
            let score = if field == "provider" && blacklisted {
                0.0
            } else {
                round2(score)
            };
            FrequencyRow {
                value,
                count,
                score,
                blacklisted,
            }
        })
        .collect();
    // Most common first, ties by name, matching the published tables.
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    Ok(rows)
}

/// Score the whole population from its latest snapshots.
///
/// Validators missing a configured score field are skipped with a
/// warning; one incomplete record must not fail the batch. The input is
/// processed in stash order so a seeded `rng` reproduces totals exactly.
pub fn score_validators(
    latest: &[Snapshot],
    config: &NetworkConfig,
    rng: &mut impl Rng,
) -> Result<ScoreReport> {
    let location_table = frequency_table(latest, "location", config)?;
    let provider_table = frequency_table(latest, "provider", config)?;
    let location_scores: BTreeMap<&str, f64> = location_table
        .iter()
        .map(|row| (row.value.as_str(), row.score))
        .collect();
    let provider_scores: BTreeMap<&str, f64> = provider_table
        .iter()
        .map(|row| (row.value.as_str(), row.score))
        .collect();

    let mut ordered: Vec<&Snapshot> = latest.iter().collect();
    ordered.sort_by(|a, b| a.stash.cmp(&b.stash));

    let mut scores = Vec::with_capacity(ordered.len());
    for snap in ordered {
        let location = category(snap.text("location"));
        let provider = category(snap.text("provider"));
        let provider_blacklisted = config.blacklist.contains(&provider);

        let mut sub_scores = BTreeMap::new();
        let mut missing = None;
        for name in config.fields.keys() {
            let value = match name.as_str() {
                "location" => location_scores.get(location.as_str()).copied(),
                "provider" => {
                    if provider_blacklisted {
                        Some(0.0)
                    } else {
                        provider_scores.get(provider.as_str()).copied()
                    }
                }
                _ => snap.number(&NetworkConfig::score_key(name)),
            };
            match value {
                Some(value) => {
                    sub_scores.insert(name.clone(), value);
                }
                None => {
                    missing = Some(name.clone());
                    break;
                }
            }
        }
        if let Some(field) = missing {
            warn!(stash = %snap.stash, field, "skipping validator with incomplete score data");
            continue;
        }

        let aggregate: f64 = sub_scores.values().sum();
        let randomness = 1.0 + rng.gen::<f64>() * config.randomness;
        let total = aggregate * randomness;
        debug!(stash = %snap.stash, aggregate, total, "scored validator");

        scores.push(ValidatorScore {
            stash: snap.stash.clone(),
            name: snap.text("name").map(str::to_string),
            location,
            provider,
            dump_time: snap.dump_time,
            score_time: snap.score_time,
            fields: snap.fields.clone(),
            sub_scores,
            provider_blacklisted,
            aggregate,
            randomness,
            total,
        });
    }

    Ok(ScoreReport {
        scores,
        location_table,
        provider_table,
    })
}

fn category(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => EMPTY_CATEGORY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use erascore_types::FieldValue;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn config() -> NetworkConfig {
        NetworkConfig::builtin("kusama").unwrap()
    }

    fn snap(stash: &str, location: &str, provider: &str, config: &NetworkConfig) -> Snapshot {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), FieldValue::Text(format!("val-{stash}")));
        fields.insert("location".to_string(), FieldValue::Text(location.into()));
        fields.insert("provider".to_string(), FieldValue::Text(provider.into()));
        for name in config.fields.keys() {
            fields.insert(
                NetworkConfig::score_key(name),
                FieldValue::Number(1.0),
            );
        }
        Snapshot {
            stash: stash.to_string(),
            dump_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            score_time: Utc.timestamp_opt(1_699_990_000, 0).unwrap(),
            fields,
        }
    }

    fn population(config: &NetworkConfig) -> Vec<Snapshot> {
        vec![
            snap("v1", "Helsinki", "Acme", config),
            snap("v2", "Lisbon", "Acme", config),
            snap("v3", "Berlin", "OVH SAS", config),
            snap("v4", "", "", config),
        ]
    }

    fn blacklisting_acme() -> NetworkConfig {
        let mut config = config();
        config.blacklist.insert("Acme".to_string());
        config
    }

    #[test]
    fn empty_strings_become_their_own_category() {
        let config = config();
        let rows = frequency_table(&population(&config), "location", &config).unwrap();
        assert!(rows.iter().any(|row| row.value == EMPTY_CATEGORY));
        let total: u64 = rows.iter().map(|row| row.count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn blacklisted_providers_get_zero_frequency_score() {
        let config = blacklisting_acme();
        let rows = frequency_table(&population(&config), "provider", &config).unwrap();
        let acme = rows.iter().find(|row| row.value == "Acme").unwrap();
        assert_eq!(acme.count, 2);
        assert!(acme.blacklisted);
        assert_eq!(acme.score, 0.0);
        let ovh = rows.iter().find(|row| row.value == "OVH SAS").unwrap();
        assert!(!ovh.blacklisted);
    }

    #[test]
    fn blacklist_override_spares_location_scores() {
        // Two validators share the blacklisted provider "Acme" but sit in
        // distinct locations: both lose the provider score, neither loses
        // the location score.
        let config = blacklisting_acme();
        let mut rng = StdRng::seed_from_u64(7);
        let report = score_validators(&population(&config), &config, &mut rng).unwrap();

        for stash in ["v1", "v2"] {
            let score = report.scores.iter().find(|s| s.stash == stash).unwrap();
            assert!(score.provider_blacklisted);
            assert_eq!(score.sub_scores["provider"], 0.0);
            assert!(score.sub_scores["location"] > 0.0);
        }
        let v3 = report.scores.iter().find(|s| s.stash == "v3").unwrap();
        assert!(!v3.provider_blacklisted);
    }

    #[test]
    fn location_blacklist_flag_requires_every_member() {
        let config = blacklisting_acme();
        let mut snaps = population(&config);
        // Two validators in Helsinki: one on Acme (blacklisted), one not.
        snaps.push(snap("v5", "Helsinki", "OVH SAS", &config));
        let rows = frequency_table(&snaps, "location", &config).unwrap();
        let helsinki = rows.iter().find(|row| row.value == "Helsinki").unwrap();
        assert!(!helsinki.blacklisted);
        let lisbon = rows.iter().find(|row| row.value == "Lisbon").unwrap();
        assert!(lisbon.blacklisted);
    }

    #[test]
    fn aggregate_sums_sub_scores_and_total_is_bounded() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(42);
        let report = score_validators(&population(&config), &config, &mut rng).unwrap();
        assert_eq!(report.scores.len(), 4);

        for score in &report.scores {
            let manual: f64 = score.sub_scores.values().sum();
            assert!((score.aggregate - manual).abs() < 1e-9);
            assert!(score.total >= score.aggregate);
            assert!(score.total < score.aggregate * (1.0 + config.randomness) + 1e-9);
            assert_eq!(score.sub_scores.len(), config.fields.len());
        }
    }

    #[test]
    fn seeded_rng_reproduces_totals() {
        let config = config();
        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            score_validators(&population(&config), &config, &mut rng).unwrap()
        };
        assert_eq!(run(42), run(42));
        let a = run(1);
        let b = run(2);
        assert_eq!(a.scores.len(), b.scores.len());
        assert!(a
            .scores
            .iter()
            .zip(&b.scores)
            .all(|(x, y)| x.aggregate == y.aggregate));
        assert!(a
            .scores
            .iter()
            .zip(&b.scores)
            .any(|(x, y)| x.total != y.total));
    }

    #[test]
    fn output_record_carries_raw_fields_and_timestamps() {
        let config = config();
        let mut snaps = population(&config);
        snaps[0]
            .fields
            .insert("rank".to_string(), FieldValue::Number(17.0));
        snaps[0]
            .fields
            .insert("commission".to_string(), FieldValue::Number(3.0));
        snaps[0]
            .fields
            .insert("score.session".to_string(), FieldValue::Number(41_112.0));

        let mut rng = StdRng::seed_from_u64(5);
        let report = score_validators(&snaps, &config, &mut rng).unwrap();
        let v1 = report.scores.iter().find(|s| s.stash == "v1").unwrap();

        assert_eq!(v1.fields.get("rank").and_then(FieldValue::as_number), Some(17.0));
        assert_eq!(
            v1.fields.get("commission").and_then(FieldValue::as_number),
            Some(3.0)
        );
        assert_eq!(
            v1.fields.get("score.session").and_then(FieldValue::as_number),
            Some(41_112.0)
        );
        assert_eq!(v1.dump_time, snaps[0].dump_time);
        assert_eq!(v1.score_time, snaps[0].score_time);
        // The raw map is the scored snapshot's, unmodified.
        assert_eq!(v1.fields, snaps[0].fields);
    }

    #[test]
    fn incomplete_validators_are_skipped_not_fatal() {
        let config = config();
        let mut snaps = population(&config);
        snaps[0].fields.remove("score.bonded");
        let mut rng = StdRng::seed_from_u64(3);
        let report = score_validators(&snaps, &config, &mut rng).unwrap();
        assert_eq!(report.scores.len(), 3);
        assert!(report.scores.iter().all(|score| score.stash != "v1"));
    }

    #[test]
    fn frequency_rows_order_by_count_descending() {
        let config = config();
        let mut snaps = population(&config);
        snaps.push(snap("v5", "Helsinki", "Acme", &config));
        let rows = frequency_table(&snaps, "location", &config).unwrap();
        assert_eq!(rows[0].value, "Helsinki");
        assert_eq!(rows[0].count, 2);
        for pair in rows.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
    }
}
