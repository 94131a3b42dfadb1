//! Network-scoped scoring configuration.
//!
//! Weights, quantile bounds, descriptions and the provider blacklist are
//! constructed once at startup (built-in defaults or a TOML file) and
//! passed by reference into the engine. There is no process-global
//! configuration lookup; each supported network gets its own value with
//! identical logic but different era durations and constants.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Meta score fields derived from the others rather than weighted
/// directly: their "weights" are computed from the non-meta sum.
pub const META_FIELDS: [&str; 3] = ["aggregate", "randomness", "total"];

/// Default quantile cut points for fields without a special rule.
pub const LOW_Q_DEFAULT: f64 = 0.1;
pub const HIGH_Q_DEFAULT: f64 = 0.9;

/// Errors raised during configuration load and validation. All of these
/// are fatal at startup; scoring never begins with a bad config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("era duration must be positive, got {0} seconds")]
    InvalidEraDuration(i64),

    #[error("field {field}: quantile bounds must satisfy 0 <= low < high <= 1, got ({low}, {high})")]
    InvalidQuantileRange { field: String, low: f64, high: f64 },

    #[error("field {field}: weight must be a non-negative finite number, got {weight}")]
    InvalidWeight { field: String, weight: f64 },

    #[error("meta field {0} must not carry an explicit weight")]
    MetaFieldConfigured(String),

    #[error("randomness factor must be non-negative and finite, got {0}")]
    InvalidRandomness(f64),

    #[error("unknown built-in network {0}")]
    UnknownNetwork(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Static specification of one measured score field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreFieldSpec {
    /// Display text for reports and charts.
    pub description: String,
    /// Weight of this field in the aggregate score.
    pub weight: f64,
    /// Lower quantile cut for normalization.
    pub low_q: f64,
    /// Upper quantile cut for normalization.
    pub high_q: f64,
}

impl ScoreFieldSpec {
    fn new(description: &str, weight: f64, low_q: f64, high_q: f64) -> Self {
        Self {
            description: description.to_string(),
            weight,
            low_q,
            high_q,
        }
    }
}

/// Complete scoring configuration for one network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network identifier, e.g. "kusama" or "polkadot".
    pub network: String,
    /// Fixed era duration in seconds (6 h or 24 h on the supported chains).
    pub era_duration_secs: i64,
    /// Upper bound `r` of the uniform [1, 1+r) total-score factor.
    pub randomness: f64,
    /// Infrastructure providers whose validators get a zero provider score.
    pub blacklist: BTreeSet<String>,
    /// Non-meta score fields, keyed by bare field name ("inclusion",
    /// "location", ...). Snapshot keys carry the `score.` prefix.
    pub fields: BTreeMap<String, ScoreFieldSpec>,
}

impl NetworkConfig {
    /// Built-in configuration by network name.
    pub fn builtin(network: &str) -> Result<Self, ConfigError> {
        match network {
            "kusama" => Ok(Self::with_defaults("kusama", 6 * 60 * 60)),
            "polkadot" => Ok(Self::with_defaults("polkadot", 24 * 60 * 60)),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: NetworkConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The era length as a chrono duration.
    pub fn era_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.era_duration_secs)
    }

    /// Sum of all non-meta field weights; the weight of the derived
    /// aggregate score.
    pub fn aggregate_weight(&self) -> f64 {
        self.fields.values().map(|spec| spec.weight).sum()
    }

    /// Upper bound of the total score: aggregate weight scaled by the
    /// maximum random factor.
    pub fn total_weight_bound(&self) -> f64 {
        self.aggregate_weight() * (1.0 + self.randomness)
    }

    /// Snapshot key for a field name: `score.<name>`.
    pub fn score_key(field: &str) -> String {
        format!("score.{field}")
    }

    /// Fail-fast validation of every configured constant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.era_duration_secs <= 0 {
            return Err(ConfigError::InvalidEraDuration(self.era_duration_secs));
        }
        if !self.randomness.is_finite() || self.randomness < 0.0 {
            return Err(ConfigError::InvalidRandomness(self.randomness));
        }
        for meta in META_FIELDS {
            if self.fields.contains_key(meta) {
                return Err(ConfigError::MetaFieldConfigured(meta.to_string()));
            }
        }
        for (name, spec) in &self.fields {
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    field: name.clone(),
                    weight: spec.weight,
                });
            }
            let bounds_ok = spec.low_q >= 0.0
                && spec.high_q <= 1.0
                && spec.low_q < spec.high_q
                && spec.low_q.is_finite()
                && spec.high_q.is_finite();
            if !bounds_ok {
                return Err(ConfigError::InvalidQuantileRange {
                    field: name.clone(),
                    low: spec.low_q,
                    high: spec.high_q,
                });
            }
        }
        Ok(())
    }

    fn with_defaults(network: &str, era_duration_secs: i64) -> Self {
        let mut fields = BTreeMap::new();
        let mut field = |name: &str, description: &str, weight: f64, low_q: f64, high_q: f64| {
            fields.insert(
                name.to_string(),
                ScoreFieldSpec::new(description, weight, low_q, high_q),
            );
        };

        field(
            "inclusion",
            "Inclusion: Active for last 84 eras",
            200.0,
            0.2,
            0.75,
        );
        field(
            "spanInclusion",
            "Span inclusion: Active for last 28 eras",
            200.0,
            0.2,
            0.75,
        );
        field(
            "discovered",
            "Discovered: Join date in the programme",
            5.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "nominated",
            "Nominated: Last time nominated by the programme",
            30.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "rank",
            "Rank: Rank in the programme",
            5.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "bonded",
            "Bonded: Amount of self bond",
            50.0,
            0.05,
            0.85,
        );
        field(
            "faults",
            "Faults: Number of on chain faults",
            5.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "offline",
            "Offline: Offline during this week",
            2.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "location",
            "Location: Location shared by other validators",
            40.0,
            0.1,
            0.95,
        );
        field(
            "councilStake",
            "Council: Bond for council elections",
            10.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "democracy",
            "Gov 1 democracy: Consistency in referenda voting",
            30.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "openGov",
            "OpenGov democracy: Consistency in referenda voting",
            100.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );
        field(
            "delegations",
            "Gov 1 delegations to you",
            60.0,
            0.1,
            0.95,
        );
        field(
            "nominatorStake",
            "Nominations: Total except programme nominations",
            100.0,
            0.1,
            0.95,
        );
        field(
            "region",
            "Region: Region shared by other validators",
            10.0,
            0.1,
            0.95,
        );
        field(
            "country",
            "Country: Country shared by other validators",
            10.0,
            0.1,
            0.95,
        );
        field(
            "provider",
            "Provider: Provider shared by other validators",
            100.0,
            0.1,
            0.95,
        );
        field(
            "openGovDelegations",
            "OpenGov delegations to any of your identities",
            100.0,
            LOW_Q_DEFAULT,
            HIGH_Q_DEFAULT,
        );

        let blacklist = [
            "Hetzner Online GmbH",
            "Contabo Inc.",
            "Contabo GmbH",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            network: network.to_string(),
            era_duration_secs,
            randomness: 0.15,
            blacklist,
            fields,
        }
    }
}
