//! Causal effect graph with time-lagged propagation.
//!
//! Edges are static configuration. All randomness enters through the state the
//! caller hands in; given the same state and queue, [`CausalGraph::propagate`]
//! is fully deterministic because edges are visited in definition order.

use crate::state::{BusinessState, Metric};
use serde::{Deserialize, Serialize};

/// `(state, source_value) -> effect value`.
pub type EffectFn = fn(&BusinessState, f64) -> f64;

/// Multiplicative effects within this distance of 1.0 are dropped.
pub const NEGLIGIBLE_FACTOR: f64 = 0.001;
/// Additive effects with smaller magnitude are dropped.
pub const NEGLIGIBLE_DELTA: f64 = 0.01;

/// Growth ratio (new customers / existing customers) that counts as rapid growth.
pub const RAPID_GROWTH_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMode {
    Additive,
    Multiplicative,
    Set,
}

impl EffectMode {
    pub fn apply(self, current: f64, value: f64) -> f64 {
        match self {
            EffectMode::Additive => current + value,
            EffectMode::Multiplicative => current * value,
            EffectMode::Set => value,
        }
    }

    /// True for effects that would only produce no-op queue entries.
    pub fn is_negligible(self, value: f64) -> bool {
        match self {
            EffectMode::Additive => value.abs() < NEGLIGIBLE_DELTA,
            EffectMode::Multiplicative => (value - 1.0).abs() < NEGLIGIBLE_FACTOR,
            EffectMode::Set => value == 0.0,
        }
    }
}

/// Directed, weighted relationship `source -> target`.
#[derive(Debug, Clone)]
pub struct CausalEdge {
    pub source: Metric,
    pub target: Metric,
    pub effect: EffectFn,
    pub mode: EffectMode,
    /// 0 = applied in the same pass.
    pub lag_months: u32,
    /// Edge is skipped while the source value is below this.
    pub threshold: Option<f64>,
    pub description: &'static str,
}

impl CausalEdge {
    pub fn new(
        source: Metric,
        target: Metric,
        mode: EffectMode,
        effect: EffectFn,
        description: &'static str,
    ) -> Self {
        Self {
            source,
            target,
            effect,
            mode,
            lag_months: 0,
            threshold: None,
            description,
        }
    }

    pub fn lag(mut self, months: u32) -> Self {
        self.lag_months = months;
        self
    }

    pub fn threshold(mut self, min_source: f64) -> Self {
        self.threshold = Some(min_source);
        self
    }
}

/// A consequence that is not yet due.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaggedEffect {
    pub target: Metric,
    pub value: f64,
    pub mode: EffectMode,
    /// Propagation passes still to wait; applied on the pass that sees 0.
    pub months_remaining: u32,
    pub source: Metric,
    pub description: &'static str,
}

impl LaggedEffect {
    fn apply_to(&self, state: &mut BusinessState) {
        let current = state.get(self.target);
        state.set(self.target, self.mode.apply(current, self.value));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectEvent {
    /// A lagged effect came due and was applied.
    Applied,
    /// An edge fired and its effect was deferred.
    Queued,
    /// An edge fired with zero lag and was applied in place.
    Immediate,
}

/// One line of the explainability log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectLogEntry {
    pub event: EffectEvent,
    pub source: Metric,
    pub target: Metric,
    pub mode: EffectMode,
    pub value: f64,
    pub lag_months: u32,
    pub description: &'static str,
}

/// Output of one propagation pass.
#[derive(Debug, Clone)]
pub struct Propagation {
    pub state: BusinessState,
    pub queue: Vec<LaggedEffect>,
    pub log: Vec<EffectLogEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    edges: Vec<CausalEdge>,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: CausalEdge) {
        self.edges.push(edge);
    }

    pub fn with_edge(mut self, edge: CausalEdge) -> Self {
        self.add_edge(edge);
        self
    }

    pub fn edges(&self) -> &[CausalEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Run one month of causal propagation.
    ///
    /// 1. Apply every pending effect whose countdown is zero.
    /// 2. Count the rest down by one month.
    /// 3. Fire every edge against the current state, in definition order. Zero-lag
    ///    effects land immediately (later edges see them); lagged ones are queued so
    ///    that an edge with lag N fired in pass t is applied in pass t+N.
    pub fn propagate(&self, mut state: BusinessState, queue: Vec<LaggedEffect>) -> Propagation {
        let mut log = Vec::new();
        let mut pending = Vec::with_capacity(queue.len());

        for mut effect in queue {
            if effect.months_remaining == 0 {
                effect.apply_to(&mut state);
                log.push(EffectLogEntry {
                    event: EffectEvent::Applied,
                    source: effect.source,
                    target: effect.target,
                    mode: effect.mode,
                    value: effect.value,
                    lag_months: 0,
                    description: effect.description,
                });
            } else {
                effect.months_remaining -= 1;
                pending.push(effect);
            }
        }

        for edge in &self.edges {
            let source_value = state.get(edge.source);
            if let Some(t) = edge.threshold {
                if source_value < t {
                    continue;
                }
            }

            let value = (edge.effect)(&state, source_value);
            if edge.mode.is_negligible(value) {
                continue;
            }

            let effect = LaggedEffect {
                target: edge.target,
                value,
                mode: edge.mode,
                months_remaining: edge.lag_months.saturating_sub(1),
                source: edge.source,
                description: edge.description,
            };

            let event = if edge.lag_months > 0 {
                pending.push(effect);
                EffectEvent::Queued
            } else {
                effect.apply_to(&mut state);
                EffectEvent::Immediate
            };
            log.push(EffectLogEntry {
                event,
                source: edge.source,
                target: edge.target,
                mode: edge.mode,
                value,
                lag_months: edge.lag_months,
                description: edge.description,
            });
        }

        Propagation {
            state,
            queue: pending,
            log,
        }
    }

    /// The reference graph: direct decision effects, effects of derived metrics,
    /// and slow strategic feedback loops.
    pub fn prototype() -> Self {
        use EffectMode::{Additive, Multiplicative, Set};
        use Metric::*;

        CausalGraph::new()
            .with_edge(CausalEdge::new(
                AdSpend,
                NewCustomers,
                Set,
                acquired_customers,
                "Ad spend directly acquires customers",
            ))
            .with_edge(CausalEdge::new(
                NewCustomers,
                Burn,
                Additive,
                |_, new_customers| new_customers * 10.0,
                "More customers increase burn ($10 ops cost each)",
            ))
            .with_edge(
                CausalEdge::new(
                    AdSpend,
                    Cac,
                    Multiplicative,
                    |_, _| 0.95,
                    "High ad spend improves CAC efficiency",
                )
                .threshold(50_000.0),
            )
            .with_edge(
                CausalEdge::new(
                    AdSpend,
                    MarketSaturation,
                    Set,
                    |_, ad_spend| (ad_spend / 100_000.0).min(1.0),
                    "High ad spend saturates the market",
                )
                .lag(1),
            )
            .with_edge(
                CausalEdge::new(
                    MarketSaturation,
                    Cac,
                    Multiplicative,
                    |_, saturation| 1.0 + saturation * 0.3,
                    "Market saturation increases CAC",
                )
                .threshold(0.3)
                .lag(2),
            )
            .with_edge(
                CausalEdge::new(
                    MarketSaturation,
                    Arpu,
                    Multiplicative,
                    |_, saturation| 1.0 - saturation * 0.15,
                    "Market saturation reduces ARPU",
                )
                .threshold(0.3)
                .lag(2),
            )
            .with_edge(CausalEdge::new(
                NewCustomers,
                RapidGrowth,
                Set,
                growth_ratio,
                "Detect rapid growth",
            ))
            .with_edge(
                CausalEdge::new(
                    RapidGrowth,
                    CulturalDegradation,
                    Set,
                    |_, growth| growth * 0.5,
                    "Rapid growth degrades culture",
                )
                .lag(3),
            )
            .with_edge(
                CausalEdge::new(
                    CulturalDegradation,
                    ChurnRate,
                    Multiplicative,
                    |_, degradation| 1.0 + degradation,
                    "Cultural degradation increases churn",
                )
                .threshold(0.1)
                .lag(2),
            )
    }
}

fn acquired_customers(state: &BusinessState, ad_spend: f64) -> f64 {
    if state.cac > 0.0 {
        (ad_spend / state.cac).trunc()
    } else {
        0.0
    }
}

// Customers still holds last month's base while the graph runs.
fn growth_ratio(state: &BusinessState, new_customers: f64) -> f64 {
    let ratio = new_customers / state.customers.max(1) as f64;
    if ratio >= RAPID_GROWTH_RATIO {
        ratio
    } else {
        0.0
    }
}
