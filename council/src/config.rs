//! Council configuration — roster, thresholds, heuristic weights, labels.
//!
//! All knobs carry serde defaults so a partial TOML file (or none at all)
//! yields a working configuration. Validation happens once, at orchestrator
//! construction; a validated config never fails mid-run.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by configuration loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The agent roster has no entries.
    #[error("agent roster is empty")]
    EmptyRoster,
    /// A threshold knob is outside [0, 1].
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange {
        /// Name of the offending knob.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable knobs for a council run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// Agent styles forming the roster, in fixed order.
    #[serde(default = "default_agent_styles")]
    pub agent_styles: Vec<String>,

    /// Whether the run uses the scientific cohort (arbiter role and labels).
    #[serde(default)]
    pub scientific_mode: bool,

    /// Maximum critique-tree depth; recursion stops at this depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum assessed confidence for a branch to be kept and expanded.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Minimum adjusted confidence for a node to reach synthesis.
    #[serde(default = "default_synthesis_confidence_threshold")]
    pub synthesis_confidence_threshold: f64,

    /// Weight of the peer-consensus term in self-critique.
    #[serde(default = "default_consensus_weight")]
    pub consensus_weight: f64,

    /// Weight of the severity-divergence term in self-critique.
    #[serde(default = "default_severity_weight")]
    pub severity_weight: f64,

    /// Cap on the magnitude of any single self-critique delta.
    #[serde(default = "default_max_delta")]
    pub max_delta: f64,

    /// Per-level attenuation of self-critique deltas (deeper nodes move less).
    #[serde(default = "default_depth_decay")]
    pub depth_decay: f64,

    /// Deltas below this magnitude are not emitted at all.
    #[serde(default = "default_minimum_delta")]
    pub minimum_delta: f64,

    /// Cohort display labels, keyed by "scientific" / "philosophical" /
    /// "default".
    #[serde(default = "default_cohort_labels")]
    pub cohort_labels: HashMap<String, String>,

    /// Per-style area-label overrides; a "default" key applies to all
    /// styles, and "{style}" inside a value is substituted.
    #[serde(default)]
    pub agent_area_labels: HashMap<String, String>,

    /// Seed for the point-assignment shuffle; unset draws from entropy.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            agent_styles: default_agent_styles(),
            scientific_mode: false,
            max_depth: default_max_depth(),
            confidence_threshold: default_confidence_threshold(),
            synthesis_confidence_threshold: default_synthesis_confidence_threshold(),
            consensus_weight: default_consensus_weight(),
            severity_weight: default_severity_weight(),
            max_delta: default_max_delta(),
            depth_decay: default_depth_decay(),
            minimum_delta: default_minimum_delta(),
            cohort_labels: default_cohort_labels(),
            agent_area_labels: HashMap::new(),
            shuffle_seed: None,
        }
    }
}

fn default_agent_styles() -> Vec<String> {
    [
        "Stoic",
        "Skeptic",
        "Empiricist",
        "Rationalist",
        "Pragmatist",
        "Utilitarian",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_depth() -> usize {
    3
}

fn default_confidence_threshold() -> f64 {
    0.4
}

fn default_synthesis_confidence_threshold() -> f64 {
    0.4
}

fn default_consensus_weight() -> f64 {
    0.6
}

fn default_severity_weight() -> f64 {
    0.3
}

fn default_max_delta() -> f64 {
    0.35
}

fn default_depth_decay() -> f64 {
    0.2
}

fn default_minimum_delta() -> f64 {
    0.01
}

fn default_cohort_labels() -> HashMap<String, String> {
    HashMap::from([
        ("scientific".to_string(), "Scientific".to_string()),
        ("philosophical".to_string(), "Philosophical".to_string()),
        ("default".to_string(), "Council".to_string()),
    ])
}

impl CouncilConfig {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: CouncilConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Tries to load `council.toml` from the current directory, falling back
    /// to defaults.
    pub fn load_or_default() -> Self {
        Self::load("council.toml").unwrap_or_default()
    }

    /// Validates the configuration. Called once at orchestrator
    /// construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_styles.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            (
                "synthesis_confidence_threshold",
                self.synthesis_confidence_threshold,
            ),
            ("max_delta", self.max_delta),
            ("minimum_delta", self.minimum_delta),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Number of agents in the roster.
    pub fn roster_size(&self) -> usize {
        self.agent_styles.len()
    }
}
