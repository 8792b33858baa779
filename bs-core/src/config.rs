//! YAML configuration for the simulator, the search and the batch runner.
//!
//! Every section has defaults, so an empty document is a valid config that
//! reproduces the reference setup.

use crate::action::{default_discretizer, ActionSpaceError, AxisSpec, Discretizer};
use crate::engine::{reference_initial_state, Scoring, SimulationEngine, SimulationSettings};
use crate::graph::CausalGraph;
use crate::state::BusinessState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid action space: {0}")]
    ActionSpace(#[from] ActionSpaceError),
    #[error("Invalid config: {msg}")]
    Invalid { msg: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub scoring: Scoring,
    /// Opening position for `advise` and `batch`.
    #[serde(default = "reference_initial_state")]
    pub initial_state: BusinessState,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Decision axes; `None` selects the built-in catalog.
    #[serde(default)]
    pub action_space: Option<Vec<AxisSpec>>,
}

/// Tree search settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Iterations per decision.
    #[serde(default = "default_search_iterations")]
    pub iterations: u32,
    /// UCB1 exploration constant.
    #[serde(default = "default_search_exploration")]
    pub exploration: f64,
    #[serde(default = "default_search_seed")]
    pub seed: u64,
}

fn default_search_iterations() -> u32 {
    500
}

fn default_search_exploration() -> f64 {
    std::f64::consts::SQRT_2
}

fn default_search_seed() -> u64 {
    42
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: default_search_iterations(),
            exploration: default_search_exploration(),
            seed: default_search_seed(),
        }
    }
}

/// Monte Carlo batch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_runs")]
    pub runs: u32,
    #[serde(default = "default_batch_months")]
    pub months: u32,
    /// Base seed; run `i` uses `seed + i`. `None` draws one from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Relative jitter applied to external modifiers.
    #[serde(default = "default_batch_modifier_noise")]
    pub modifier_noise: f64,
}

fn default_batch_runs() -> u32 {
    50
}

fn default_batch_months() -> u32 {
    12
}

fn default_batch_modifier_noise() -> f64 {
    0.05
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            runs: default_batch_runs(),
            months: default_batch_months(),
            seed: None,
            modifier_noise: default_batch_modifier_noise(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            scoring: Scoring::default(),
            initial_state: reference_initial_state(),
            search: SearchConfig::default(),
            batch: BatchConfig::default(),
            action_space: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Check the numeric sections. The action space is checked by `discretizer`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid { msg: msg.to_string() });

        if self.simulation.horizon_months == 0 {
            return invalid("simulation.horizon_months must be > 0");
        }
        if !(self.simulation.baseline_cac.is_finite() && self.simulation.baseline_cac > 0.0) {
            return invalid("simulation.baseline_cac must be finite and > 0");
        }
        let s = &self.scoring;
        if !(s.cash_scale > 0.0 && s.customer_scale > 0.0 && s.arpu_scale > 0.0) {
            return invalid("scoring scales must be > 0");
        }
        if !(self.search.exploration.is_finite() && self.search.exploration >= 0.0) {
            return invalid("search.exploration must be finite and >= 0");
        }
        if self.batch.runs == 0 || self.batch.months == 0 {
            return invalid("batch.runs and batch.months must be > 0");
        }
        if !(0.0..1.0).contains(&self.batch.modifier_noise) {
            return invalid("batch.modifier_noise must be in [0, 1)");
        }
        Ok(())
    }

    pub fn discretizer(&self) -> Result<Discretizer, ConfigError> {
        match &self.action_space {
            Some(specs) => Ok(Discretizer::from_specs(specs)?),
            None => Ok(default_discretizer()),
        }
    }

    /// Validate everything and assemble the simulation environment.
    pub fn build_engine(&self) -> Result<SimulationEngine, ConfigError> {
        self.validate()?;
        let discretizer = self.discretizer()?;
        Ok(SimulationEngine::new(CausalGraph::prototype(), discretizer)
            .with_settings(self.simulation.clone())
            .with_scoring(self.scoring.clone())
            .with_initial_state(self.initial_state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Metric;

    #[test]
    fn test_load_default_yaml() {
        let config = Config::load("../configs/default.yaml").expect("Failed to load configs/default.yaml");

        assert_eq!(config.simulation.horizon_months, 12);
        assert_eq!(config.simulation.baseline_cac, 100.0);
        assert!(config.simulation.enforce_constraints);
        assert_eq!(config.initial_state.cash, 500_000.0);
        assert_eq!(config.initial_state.customers, 1000);
        assert_eq!(config.search.iterations, 500);
        assert_eq!(config.search.seed, 42);
        assert_eq!(config.batch.runs, 50);

        // The checked-in file spells out the built-in catalog.
        let d = config.discretizer().unwrap();
        assert_eq!(d.to_specs(), default_discretizer().to_specs());
        assert_eq!(config.build_engine().unwrap().legal_moves().len(), 25);
    }

    #[test]
    fn test_empty_yaml_is_reference_setup() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.simulation, SimulationSettings::default());
        assert_eq!(config.scoring, Scoring::default());
        assert_eq!(config.initial_state, reference_initial_state());
        assert!(config.action_space.is_none());
        assert!((config.search.exploration - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert_eq!(config.batch.seed, None);
    }

    #[test]
    fn test_parse_yaml_string() {
        let yaml = r#"
simulation:
  horizon_months: 6
  enforce_constraints: false
scoring:
  bankruptcy_score: -500
search:
  iterations: 64
action_space:
  - axis: burn
    groups:
      - { name: Lean, min: 10000, max: 15000 }
      - name: Heavy
        min: 40000
        max: 40000
        priors:
          - target: cac
            distribution: { kind: sales_normal, mean: 1.0, sigma: 0.1 }
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.simulation.horizon_months, 6);
        assert_eq!(config.simulation.baseline_cac, 100.0);
        assert!(!config.simulation.enforce_constraints);
        assert_eq!(config.scoring.bankruptcy_score, -500.0);
        assert_eq!(config.scoring.saturation_penalty, 50.0);
        assert_eq!(config.search.iterations, 64);

        let engine = config.build_engine().unwrap();
        let moves = engine.legal_moves();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[1].name, "Heavy");
        assert_eq!(moves[1].decisions[0].axis, Metric::Burn);
    }

    #[test]
    fn test_bad_prior_fails_at_build() {
        let yaml = r#"
action_space:
  - axis: ad_spend
    groups:
      - name: Broken
        min: 1000
        max: 1000
        priors:
          - target: cac
            distribution: { kind: log_normal, mean: 0.0, sigma: 0.1 }
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let err = config.build_engine().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ActionSpace(ActionSpaceError::NonPositiveMean { .. })
        ));
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let config = Config::from_yaml("simulation: { horizon_months: 0 }").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let config = Config::from_yaml("search: { exploration: -1.0 }").unwrap();
        assert!(matches!(config.build_engine(), Err(ConfigError::Invalid { .. })));

        assert!(Config::from_yaml("simulation: [1, 2]").is_err());
    }
}
