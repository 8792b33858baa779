//! Simulation environment: legal moves, the one-month transition, terminal test
//! and the scalar evaluation used by search.
//!
//! This is the single place that advances a `BusinessState` by a month.

use crate::action::{default_discretizer, Discretizer, MonthlyPolicy, PriorTarget};
use crate::config::{Config, ConfigError};
use crate::constraints::{self, ValidationReport};
use crate::graph::{CausalGraph, EffectLogEntry, LaggedEffect, Propagation};
use crate::state::{BusinessState, CAC_SENTINEL, RUNWAY_SENTINEL};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Transition parameters that are configuration, not runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Simulation ends once `month` reaches this.
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    /// Reference CAC that `cac` priors scale.
    #[serde(default = "default_baseline_cac")]
    pub baseline_cac: f64,
    /// Clamp constrained fields after every transition.
    #[serde(default = "default_enforce_constraints")]
    pub enforce_constraints: bool,
}

fn default_horizon_months() -> u32 {
    12
}

fn default_baseline_cac() -> f64 {
    100.0
}

fn default_enforce_constraints() -> bool {
    true
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            horizon_months: default_horizon_months(),
            baseline_cac: default_baseline_cac(),
            enforce_constraints: default_enforce_constraints(),
        }
    }
}

/// Weights of the rollout heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scoring {
    pub cash_scale: f64,
    pub customer_scale: f64,
    pub arpu_scale: f64,
    pub saturation_threshold: f64,
    pub saturation_penalty: f64,
    pub degradation_threshold: f64,
    pub degradation_penalty: f64,
    /// Score of any state with negative cash.
    pub bankruptcy_score: f64,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            cash_scale: 100_000.0,
            customer_scale: 100.0,
            arpu_scale: 50.0,
            saturation_threshold: 0.8,
            saturation_penalty: 50.0,
            degradation_threshold: 0.3,
            degradation_penalty: 30.0,
            bankruptcy_score: -1000.0,
        }
    }
}

/// The standard opening position.
pub fn reference_initial_state() -> BusinessState {
    BusinessState {
        cash: 500_000.0,
        customers: 1000,
        ad_spend: 0.0,
        burn: 20_000.0,
        arpu: 50.0,
        cac: default_baseline_cac(),
        revenue: 0.0,
        runway: 0.0,
        new_customers: 0,
        churned_customers: 0,
        churn_rate: 0.05,
        traffic: 0,
        market_saturation: 0.0,
        cultural_degradation: 0.0,
        rapid_growth: 0.0,
        month: 0,
    }
}

/// Full result of one transition, for logging and explainability.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: BusinessState,
    pub effects: Vec<LaggedEffect>,
    pub log: Vec<EffectLogEntry>,
    /// Violations found before enforcement (empty when enforcement is off).
    pub report: ValidationReport,
}

#[derive(Debug, Clone)]
pub struct SimulationEngine {
    graph: CausalGraph,
    discretizer: Discretizer,
    policies: Arc<[MonthlyPolicy]>,
    settings: SimulationSettings,
    scoring: Scoring,
    initial: BusinessState,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new(CausalGraph::prototype(), default_discretizer())
    }
}

impl SimulationEngine {
    pub fn new(graph: CausalGraph, discretizer: Discretizer) -> Self {
        let policies = discretizer.generate_all_policies().into();
        Self {
            graph,
            discretizer,
            policies,
            settings: SimulationSettings::default(),
            scoring: Scoring::default(),
            initial: reference_initial_state(),
        }
    }

    /// Validate `config` and build the environment it describes.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.build_engine()
    }

    pub fn with_settings(mut self, settings: SimulationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_initial_state(mut self, state: BusinessState) -> Self {
        self.initial = state;
        self
    }

    pub fn graph(&self) -> &CausalGraph {
        &self.graph
    }

    pub fn discretizer(&self) -> &Discretizer {
        &self.discretizer
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn scoring(&self) -> &Scoring {
        &self.scoring
    }

    /// Opening state and an empty lagged-effect queue.
    pub fn initial_state(&self) -> (BusinessState, Vec<LaggedEffect>) {
        (self.initial.clone(), Vec::new())
    }

    /// The full policy catalog. Every call shares the same allocation.
    pub fn legal_moves(&self) -> Arc<[MonthlyPolicy]> {
        Arc::clone(&self.policies)
    }

    pub fn policy(&self, name: &str) -> Option<&MonthlyPolicy> {
        self.policies.iter().find(|p| p.name == name)
    }

    /// Advance one month. Inputs are never mutated.
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: &BusinessState,
        effects: &[LaggedEffect],
        policy: &MonthlyPolicy,
        rng: &mut R,
    ) -> (BusinessState, Vec<LaggedEffect>) {
        let out = self.step_traced(state, effects, policy, rng);
        (out.state, out.effects)
    }

    /// [`step`](Self::step) plus the propagation log and constraint report.
    pub fn step_traced<R: Rng + ?Sized>(
        &self,
        state: &BusinessState,
        effects: &[LaggedEffect],
        policy: &MonthlyPolicy,
        rng: &mut R,
    ) -> StepOutcome {
        let mut next = state.clone();
        next.month += 1;
        // Event metrics describe this month only. A zero-valued set edge is
        // skipped, so without the reset one spike would latch forever.
        next.new_customers = 0;
        next.rapid_growth = 0.0;
        next.market_saturation = 0.0;
        next.cultural_degradation = 0.0;

        for decision in &policy.decisions {
            let value = decision.group.sample(rng);
            next.set(decision.axis, value);
        }

        for decision in &policy.decisions {
            for prior in &decision.group.priors {
                let multiplier = prior.distribution.sample_multiplier(rng);
                apply_prior(&mut next, prior.target, multiplier, self.settings.baseline_cac);
            }
        }

        let Propagation {
            state: mut next,
            queue,
            log,
        } = self.graph.propagate(next, effects.to_vec());

        settle_financials(&mut next);

        let report = if self.settings.enforce_constraints {
            let report = constraints::validate(&next);
            constraints::enforce(&mut next);
            report
        } else {
            ValidationReport::default()
        };

        StepOutcome {
            state: next,
            effects: queue,
            log,
            report,
        }
    }

    /// Rollout heuristic; bankruptcy dominates everything else.
    pub fn evaluate(&self, state: &BusinessState) -> f64 {
        let w = &self.scoring;
        if state.cash < 0.0 {
            return w.bankruptcy_score;
        }

        let cash_score = state.cash / w.cash_scale;
        let growth_score = (state.customers as f64 / w.customer_scale) * (state.arpu / w.arpu_scale);

        let mut penalty = 0.0;
        if state.market_saturation > w.saturation_threshold {
            penalty += w.saturation_penalty;
        }
        if state.cultural_degradation > w.degradation_threshold {
            penalty += w.degradation_penalty;
        }

        cash_score + growth_score - penalty
    }

    pub fn is_terminal(&self, state: &BusinessState) -> bool {
        state.month >= self.settings.horizon_months || state.cash < 0.0
    }

    pub fn survived(&self, state: &BusinessState) -> bool {
        state.cash >= 0.0
    }
}

/// Fold one sampled prior multiplier into the state.
///
/// Price-driven conversion loss is modeled as a higher effective CAC, so a
/// conversion prior divides the CAC already set by any spend prior.
pub fn apply_prior(state: &mut BusinessState, target: PriorTarget, multiplier: f64, baseline_cac: f64) {
    match target {
        PriorTarget::Cac => state.cac = baseline_cac * multiplier,
        PriorTarget::ConversionRate => {
            if multiplier > 0.0 {
                state.cac /= multiplier;
            } else {
                state.cac = CAC_SENTINEL;
            }
        }
    }
}

/// Revenue, cash, runway and churn for the month just simulated.
pub fn settle_financials(state: &mut BusinessState) {
    state.revenue = state.customers as f64 * state.arpu;
    state.cash += state.revenue - state.burn - state.ad_spend;

    let spend = state.burn + state.ad_spend;
    state.runway = if spend > 0.0 {
        state.cash / spend
    } else {
        RUNWAY_SENTINEL
    };

    let churned = (state.customers as f64 * state.churn_rate).floor().max(0.0) as u64;
    state.churned_customers = churned;
    let remaining = state.customers as i128 - churned as i128 + state.new_customers as i128;
    state.customers = remaining.max(0) as u64;
}
