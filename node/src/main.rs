//! Batch driver for the erascore engine.
//!
//! Reads snapshot and on-chain dumps (JSON), runs one full scoring pass
//! for the selected network and writes the report files. Polling the
//! backend and the chain node, scheduling, and page rendering live in
//! external tooling; this binary only consumes their dumps.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use erascore_config::{NetworkConfig, META_FIELDS};
use erascore_engine::{
    align_all, era_gaps, era_range, latest_scorable_per_validator, merge_era_points,
    merge_snapshots, score_backend_delay, score_validators, EraClock, ScoreReport,
};
use erascore_types::{EraPoints, EraStart, Snapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "erascore-node",
    version = erascore_engine::VERSION,
    about = "Era-aligned validator scoring run"
)]
struct Cli {
    /// Network to score ("kusama" or "polkadot" for built-in config).
    #[arg(long, default_value = "kusama")]
    network: String,

    /// Optional TOML config overriding the built-in network defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of snapshot records.
    #[arg(long)]
    snapshots: PathBuf,

    /// JSON array of on-chain (address, era, points) rows.
    #[arg(long)]
    era_points: PathBuf,

    /// JSON array of observed (era, start) anchor rows.
    #[arg(long)]
    era_starts: PathBuf,

    /// Output directory for the report files.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Drop snapshots older than this many eras before now.
    #[arg(long, default_value_t = 200)]
    cutoff_eras: u32,

    /// Seed for the total-score random factor; omit for a random run.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    // Configuration problems are fatal before any computation starts.
    let config = match &cli.config {
        Some(path) => NetworkConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NetworkConfig::builtin(&cli.network)?,
    };
    config.validate()?;
    info!(
        network = %config.network,
        fields = config.fields.len(),
        aggregate_weight = config.aggregate_weight(),
        "starting scoring run"
    );

    let snapshots: Vec<Snapshot> = read_json(&cli.snapshots)?;
    let points: Vec<EraPoints> = read_json(&cli.era_points)?;
    let starts: Vec<EraStart> = read_json(&cli.era_starts)?;

    let cutoff = Utc::now() - config.era_duration() * cli.cutoff_eras as i32;
    run(&config, snapshots, points, starts, cutoff, cli.seed, &cli.out_dir)
}

fn run(
    config: &NetworkConfig,
    snapshots: Vec<Snapshot>,
    points: Vec<EraPoints>,
    starts: Vec<EraStart>,
    cutoff: DateTime<Utc>,
    seed: Option<u64>,
    out_dir: &Path,
) -> Result<()> {
    let snapshots = merge_snapshots(snapshots, Some(cutoff))?;
    let universe = erascore_engine::validator_universe(&snapshots);
    info!(validators = universe.len(), snapshots = snapshots.len(), "merged snapshot dumps");

    // Only rows for validators in the snapshot population matter.
    let points: Vec<EraPoints> = points
        .into_iter()
        .filter(|row| universe.contains(&row.address))
        .collect();
    let points = merge_era_points(points);
    let gaps = era_gaps(&points);
    if !gaps.is_empty() {
        warn!(gaps = gaps.len(), "continuing despite era gaps");
    }
    let (min_era, max_era) = era_range(&points)?;

    let clock = EraClock::from_observed(&starts, config.era_duration())?;
    clock.drift_seconds(&starts);
    let timeline = clock.timeline(min_era..=max_era);

    // Every configured field plus the derived meta fields gets an
    // era-aligned history for charting.
    let mut fields: Vec<String> = config.fields.keys().map(|k| NetworkConfig::score_key(k)).collect();
    fields.extend(META_FIELDS.iter().map(|meta| NetworkConfig::score_key(meta)));
    let stashes: Vec<String> = universe.into_iter().collect();
    info!(fields = fields.len(), eras = timeline.len(), "aligning scores to eras");
    let aligned = align_all(&snapshots, &stashes, &fields, &timeline);

    // Score each validator from its newest row that carries every
    // configured score field; a partial newest dump falls back.
    let latest = latest_scorable_per_validator(&snapshots, config);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let report = score_validators(&latest, config, &mut rng)?;

    let (_, delay_quantiles) = score_backend_delay(&snapshots, &clock, min_era..=max_era)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    write_json(&out_dir.join("scores.json"), &report)?;
    write_json(&out_dir.join("era_series.json"), &aligned)?;
    write_json(&out_dir.join("delay_quantiles.json"), &delay_quantiles)?;
    write_ranking_csv(&out_dir.join("ranking.csv"), &report)?;
    write_frequency_csv(&out_dir.join("last_location.csv"), &report.location_table)?;
    write_frequency_csv(&out_dir.join("last_provider.csv"), &report.provider_table)?;

    info!(scored = report.scores.len(), out_dir = %out_dir.display(), "scoring run finished");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

/// Ranking table for the dashboard: name, stash, total score, best first.
fn write_ranking_csv(path: &Path, report: &ScoreReport) -> Result<()> {
    let mut ranked: Vec<_> = report.scores.iter().collect();
    ranked.sort_by(|a, b| b.total.total_cmp(&a.total));

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["name", "stash", "score"])?;
    for score in ranked {
        let total = format!("{:.2}", score.total);
        writer.write_record([
            score.name.as_deref().unwrap_or(""),
            score.stash.as_str(),
            total.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_frequency_csv(path: &Path, rows: &[erascore_engine::FrequencyRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["value", "count", "score", "blacklisted"])?;
    for row in rows {
        let count = row.count.to_string();
        let score = format!("{:.2}", row.score);
        let blacklisted = row.blacklisted.to_string();
        writer.write_record([
            row.value.as_str(),
            count.as_str(),
            score.as_str(),
            blacklisted.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
