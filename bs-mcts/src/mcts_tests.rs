use crate::arena::Arena;
use crate::mcts::{best_child, robust_child};
use crate::node::{ucb1, Node};
use crate::{Environment, Mcts, MctsConfig, MctsError};

use rand::Rng;
use std::sync::Arc;

/// Two-month toy business: `Safe` keeps cash, `Reckless` bankrupts on the spot.
struct Toy {
    horizon: u32,
    moves: Arc<[ToyMove]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToyMove {
    Safe,
    Reckless,
}

#[derive(Debug, Clone, PartialEq)]
struct ToyState {
    month: u32,
    cash: f64,
}

impl Default for Toy {
    fn default() -> Self {
        Self {
            horizon: 2,
            moves: Arc::from(vec![ToyMove::Safe, ToyMove::Reckless]),
        }
    }
}

impl Environment for Toy {
    type State = ToyState;
    type Move = ToyMove;

    fn legal_moves(&self, _state: &ToyState) -> Arc<[ToyMove]> {
        Arc::clone(&self.moves)
    }

    fn step<R: Rng + ?Sized>(&self, state: &ToyState, mv: &ToyMove, rng: &mut R) -> ToyState {
        let noise: f64 = rng.gen_range(0.0..1.0);
        let cash = match mv {
            ToyMove::Safe => state.cash + noise,
            ToyMove::Reckless => state.cash - 1_000.0,
        };
        ToyState {
            month: state.month + 1,
            cash,
        }
    }

    fn is_terminal(&self, state: &ToyState) -> bool {
        state.month >= self.horizon || state.cash < 0.0
    }

    fn evaluate(&self, state: &ToyState) -> f64 {
        if state.cash < 0.0 {
            -1000.0
        } else {
            state.cash / 100.0
        }
    }

    fn survived(&self, state: &ToyState) -> bool {
        state.cash >= 0.0
    }
}

fn root() -> ToyState {
    ToyState { month: 0, cash: 500.0 }
}

fn cfg(iterations: u32, seed: u64) -> MctsConfig {
    MctsConfig {
        iterations,
        seed,
        ..MctsConfig::default()
    }
}

#[test]
fn ucb_prefers_less_visited_child_at_equal_mean() {
    let rare = ucb1(10.0, 10, 30, std::f64::consts::SQRT_2);
    let common = ucb1(20.0, 20, 30, std::f64::consts::SQRT_2);
    assert!(rare > common);
    assert_eq!(ucb1(0.0, 0, 30, 1.0), f64::INFINITY);

    let mut arena: Arena<(), u8> = Arena::new();
    let parent = arena.push(Node::new((), None, None, Vec::new(), false));
    arena.get_mut(parent).visits = 30;
    let a = arena.push_child(parent, Node::new((), Some(parent), Some(0), Vec::new(), false));
    let b = arena.push_child(parent, Node::new((), Some(parent), Some(1), Vec::new(), false));
    arena.get_mut(a).visits = 20;
    arena.get_mut(a).value = 20.0;
    arena.get_mut(b).visits = 10;
    arena.get_mut(b).value = 10.0;

    assert_eq!(best_child(&arena, parent, std::f64::consts::SQRT_2), Some(b));
    assert_eq!(robust_child(&arena, parent), Some(a));
}

#[test]
fn ties_go_to_the_first_child() {
    let mut arena: Arena<(), u8> = Arena::new();
    let parent = arena.push(Node::new((), None, None, Vec::new(), false));
    arena.get_mut(parent).visits = 8;
    for mv in 0..3u8 {
        let c = arena.push_child(parent, Node::new((), Some(parent), Some(mv), Vec::new(), false));
        arena.get_mut(c).visits = 2;
        arena.get_mut(c).value = 1.0;
    }
    let first = arena.get(parent).children[0];
    assert_eq!(best_child(&arena, parent, 1.0), Some(first));
    assert_eq!(robust_child(&arena, parent), Some(first));
}

#[test]
fn robust_child_avoids_bankruptcy() {
    let env = Toy::default();
    let mut mcts = Mcts::new(cfg(200, 7)).unwrap();
    let res = mcts.run_search(&env, root());

    assert!(!res.used_fallback);
    assert_eq!(res.best_move, Some(ToyMove::Safe));
    assert!(res.survival_probability > 0.9, "p={}", res.survival_probability);

    let reckless = res.children.iter().find(|c| c.mv == ToyMove::Reckless).unwrap();
    assert_eq!(reckless.survival_probability, 0.0);
    assert!(reckless.visits < res.visits);
}

#[test]
fn every_iteration_visits_one_root_child() {
    let env = Toy::default();
    let mut mcts = Mcts::new(cfg(150, 1)).unwrap();
    let res = mcts.run_search(&env, root());

    let total: u32 = res.children.iter().map(|c| c.visits).sum();
    assert_eq!(total, 150);
    assert_eq!(res.stats.rollouts, 150);
    assert_eq!(res.stats.node_count, res.stats.expansions as usize + 1);
}

#[test]
fn same_seed_same_search() {
    let env = Toy::default();
    let r1 = Mcts::new(cfg(128, 999)).unwrap().run_search(&env, root());
    let r2 = Mcts::new(cfg(128, 999)).unwrap().run_search(&env, root());

    assert_eq!(r1.best_move, r2.best_move);
    assert_eq!(r1.stats, r2.stats);
    let v1: Vec<(u32, u64)> = r1.children.iter().map(|c| (c.visits, c.mean_value.to_bits())).collect();
    let v2: Vec<(u32, u64)> = r2.children.iter().map(|c| (c.visits, c.mean_value.to_bits())).collect();
    assert_eq!(v1, v2);
}

#[test]
fn zero_iterations_falls_back_to_a_random_move() {
    let env = Toy::default();
    let res = Mcts::new(cfg(0, 3)).unwrap().run_search(&env, root());
    assert!(res.used_fallback);
    assert!(res.best_move.is_some());
    assert_eq!(res.survival_probability, 0.0);
    assert!(res.children.is_empty());
    assert_eq!(res.stats.node_count, 1);
}

#[test]
fn no_legal_moves_yields_no_move() {
    let env = Toy {
        horizon: 2,
        moves: Arc::from(Vec::new()),
    };
    let res = Mcts::new(cfg(20, 3)).unwrap().run_search(&env, root());
    assert!(res.used_fallback);
    assert_eq!(res.best_move, None);
    assert_eq!(res.stats.expansions, 0);
}

#[test]
fn terminal_root_is_not_expanded() {
    let env = Toy::default();
    let done = ToyState { month: 2, cash: 10.0 };
    let res = Mcts::new(cfg(10, 3)).unwrap().run_search(&env, done);
    assert_eq!(res.stats.expansions, 0);
    assert_eq!(res.stats.rollout_steps, 0);
    assert!(res.used_fallback);
}

#[test]
fn invalid_exploration_rejected() {
    for c in [-1.0, f64::NAN, f64::INFINITY] {
        let err = Mcts::new(MctsConfig {
            exploration: c,
            ..MctsConfig::default()
        });
        assert!(matches!(err, Err(MctsError::InvalidConfig { .. })));
    }
}
