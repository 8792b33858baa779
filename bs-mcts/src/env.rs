//! The seam between search and the thing being searched.

use bs_core::{BusinessState, LaggedEffect, MonthlyPolicy, SimulationEngine};
use rand::Rng;
use std::sync::Arc;

/// A stochastic single-agent environment.
///
/// Implementations must be pure given the RNG: the same state, move and RNG
/// stream always produce the same successor.
pub trait Environment {
    type State: Clone;
    type Move: Clone;

    /// Moves playable from `state`. Called on every rollout step, so
    /// implementations should hand out a shared list rather than rebuild it.
    fn legal_moves(&self, state: &Self::State) -> Arc<[Self::Move]>;

    fn step<R: Rng + ?Sized>(&self, state: &Self::State, mv: &Self::Move, rng: &mut R) -> Self::State;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Rollout score of a (usually terminal) state.
    fn evaluate(&self, state: &Self::State) -> f64;

    fn survived(&self, state: &Self::State) -> bool;
}

/// A business state together with the effects still in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub business: BusinessState,
    pub pending: Vec<LaggedEffect>,
}

impl SimState {
    pub fn new(business: BusinessState, pending: Vec<LaggedEffect>) -> Self {
        Self { business, pending }
    }
}

impl From<(BusinessState, Vec<LaggedEffect>)> for SimState {
    fn from((business, pending): (BusinessState, Vec<LaggedEffect>)) -> Self {
        Self { business, pending }
    }
}

impl Environment for SimulationEngine {
    type State = SimState;
    type Move = MonthlyPolicy;

    fn legal_moves(&self, _state: &SimState) -> Arc<[MonthlyPolicy]> {
        SimulationEngine::legal_moves(self)
    }

    fn step<R: Rng + ?Sized>(&self, state: &SimState, mv: &MonthlyPolicy, rng: &mut R) -> SimState {
        let (business, pending) = SimulationEngine::step(self, &state.business, &state.pending, mv, rng);
        SimState { business, pending }
    }

    fn is_terminal(&self, state: &SimState) -> bool {
        SimulationEngine::is_terminal(self, &state.business)
    }

    fn evaluate(&self, state: &SimState) -> f64 {
        SimulationEngine::evaluate(self, &state.business)
    }

    fn survived(&self, state: &SimState) -> bool {
        SimulationEngine::survived(self, &state.business)
    }
}
