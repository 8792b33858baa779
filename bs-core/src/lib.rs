//! bs-core: business state, causal effect graph, action space and the
//! simulation environment.

pub mod action;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod graph;
pub mod modifiers;
pub mod state;

pub use action::{
    default_discretizer, ActionSpaceError, AxisSpec, Decision, Discretizer, MonthlyPolicy, Prior,
    PriorDistribution, PriorTarget, StrategicGroup,
};
pub use config::{BatchConfig, Config, ConfigError, SearchConfig};
pub use constraints::{ConstraintViolation, ValidationReport};
pub use engine::{reference_initial_state, Scoring, SimulationEngine, SimulationSettings, StepOutcome};
pub use graph::{CausalEdge, CausalGraph, EffectLogEntry, EffectMode, LaggedEffect, Propagation};
pub use modifiers::{ExternalModifiers, ModifierSource, StaticModifiers};
pub use state::{BusinessState, Metric, UnknownMetric, CAC_SENTINEL, RUNWAY_SENTINEL};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod state_tests;
