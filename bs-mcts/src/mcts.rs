//! UCB1 Monte Carlo Tree Search with random rollouts and survival statistics.

use crate::arena::Arena;
use crate::env::Environment;
use crate::node::{ucb1, Node, NodeId};
use bs_core::SearchConfig;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MctsConfig {
    /// Search iterations per decision. Zero is allowed and yields the fallback move.
    pub iterations: u32,
    /// UCB1 exploration constant `c`.
    pub exploration: f64,
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            exploration: std::f64::consts::SQRT_2,
            seed: 42,
        }
    }
}

impl From<&SearchConfig> for MctsConfig {
    fn from(cfg: &SearchConfig) -> Self {
        Self {
            iterations: cfg.iterations,
            exploration: cfg.exploration,
            seed: cfg.seed,
        }
    }
}

#[derive(Debug, Error)]
pub enum MctsError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchStats {
    pub node_count: usize,
    pub expansions: u32,
    pub rollouts: u32,
    pub rollout_steps: u64,
}

/// Statistics of one root child.
#[derive(Debug, Clone)]
pub struct ChildSummary<M> {
    pub mv: M,
    pub visits: u32,
    pub mean_value: f64,
    pub survival_probability: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult<M> {
    /// `None` only when the root has no legal moves at all.
    pub best_move: Option<M>,
    /// `survival_wins / visits` of the chosen child; 0.0 on fallback.
    pub survival_probability: f64,
    pub visits: u32,
    pub mean_value: f64,
    /// Root children in expansion order.
    pub children: Vec<ChildSummary<M>>,
    pub stats: SearchStats,
    /// The move was drawn at random because the root had no children.
    pub used_fallback: bool,
}

pub struct Mcts {
    cfg: MctsConfig,
    rng: ChaCha8Rng,
    stats: SearchStats,
}

impl Mcts {
    pub fn new(cfg: MctsConfig) -> Result<Self, MctsError> {
        if !(cfg.exploration.is_finite() && cfg.exploration >= 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "exploration must be finite and >= 0",
            });
        }
        Ok(Self {
            cfg,
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
            stats: SearchStats::default(),
        })
    }

    pub fn config(&self) -> &MctsConfig {
        &self.cfg
    }

    /// Restart the random stream, e.g. between independent episodes.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Search from `root` and recommend the most visited root child.
    pub fn run_search<E: Environment>(&mut self, env: &E, root: E::State) -> SearchResult<E::Move> {
        self.stats = SearchStats::default();

        let mut arena: Arena<E::State, E::Move> = Arena::new();
        let root_id = arena.push(new_node(env, root, None, None));

        for _ in 0..self.cfg.iterations {
            let leaf = self.select(&arena, root_id);
            let leaf = self.expand(env, &mut arena, leaf);
            let (value, survived) = self.rollout(env, &arena.get(leaf).state);
            backpropagate(&mut arena, leaf, value, survived);
        }

        self.stats.node_count = arena.len();
        self.finish(env, &arena, root_id)
    }

    // Descend through fully expanded, non-terminal nodes.
    fn select<S, M>(&self, arena: &Arena<S, M>, root: NodeId) -> NodeId {
        let mut id = root;
        loop {
            let node = arena.get(id);
            if node.is_terminal || !node.is_fully_expanded() {
                return id;
            }
            match best_child(arena, id, self.cfg.exploration) {
                Some(child) => id = child,
                None => return id,
            }
        }
    }

    fn expand<E: Environment>(&mut self, env: &E, arena: &mut Arena<E::State, E::Move>, id: NodeId) -> NodeId {
        if arena.get(id).is_terminal {
            return id;
        }
        let Some(mv) = arena.get_mut(id).untried.pop() else {
            return id;
        };
        let state = env.step(&arena.get(id).state, &mv, &mut self.rng);
        let child = new_node(env, state, Some(id), Some(mv));
        self.stats.expansions += 1;
        arena.push_child(id, child)
    }

    fn rollout<E: Environment>(&mut self, env: &E, start: &E::State) -> (f64, bool) {
        self.stats.rollouts += 1;
        let mut state = start.clone();
        while !env.is_terminal(&state) {
            let moves = env.legal_moves(&state);
            let Some(mv) = moves.choose(&mut self.rng) else {
                break;
            };
            state = env.step(&state, mv, &mut self.rng);
            self.stats.rollout_steps += 1;
        }
        (env.evaluate(&state), env.survived(&state))
    }

    fn finish<E: Environment>(
        &mut self,
        env: &E,
        arena: &Arena<E::State, E::Move>,
        root_id: NodeId,
    ) -> SearchResult<E::Move> {
        let root = arena.get(root_id);
        let children: Vec<ChildSummary<E::Move>> = root
            .children
            .iter()
            .filter_map(|&c| {
                let node = arena.get(c);
                node.mv.clone().map(|mv| ChildSummary {
                    mv,
                    visits: node.visits,
                    mean_value: node.mean_value(),
                    survival_probability: node.survival_rate(),
                })
            })
            .collect();

        match robust_child(arena, root_id) {
            Some(best) => {
                let node = arena.get(best);
                SearchResult {
                    best_move: node.mv.clone(),
                    survival_probability: node.survival_rate(),
                    visits: node.visits,
                    mean_value: node.mean_value(),
                    children,
                    stats: self.stats.clone(),
                    used_fallback: false,
                }
            }
            None => {
                let moves = env.legal_moves(&root.state);
                SearchResult {
                    best_move: moves.choose(&mut self.rng).cloned(),
                    survival_probability: 0.0,
                    visits: 0,
                    mean_value: 0.0,
                    children,
                    stats: self.stats.clone(),
                    used_fallback: true,
                }
            }
        }
    }
}

fn new_node<E: Environment>(
    env: &E,
    state: E::State,
    parent: Option<NodeId>,
    mv: Option<E::Move>,
) -> Node<E::State, E::Move> {
    let is_terminal = env.is_terminal(&state);
    let untried = if is_terminal {
        Vec::new()
    } else {
        env.legal_moves(&state).to_vec()
    };
    Node::new(state, parent, mv, untried, is_terminal)
}

/// Child of `id` maximizing UCB1; the first child wins ties.
pub(crate) fn best_child<S, M>(arena: &Arena<S, M>, id: NodeId, exploration: f64) -> Option<NodeId> {
    let parent_visits = arena.get(id).visits;
    let mut best: Option<(NodeId, f64)> = None;
    for &c in &arena.get(id).children {
        let node = arena.get(c);
        let score = ucb1(node.value, node.visits, parent_visits, exploration);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((c, score));
        }
    }
    best.map(|(c, _)| c)
}

/// Most visited child of `id`; the first child wins ties.
pub(crate) fn robust_child<S, M>(arena: &Arena<S, M>, id: NodeId) -> Option<NodeId> {
    let mut best: Option<(NodeId, u32)> = None;
    for &c in &arena.get(id).children {
        let visits = arena.get(c).visits;
        if best.map_or(true, |(_, v)| visits > v) {
            best = Some((c, visits));
        }
    }
    best.map(|(c, _)| c)
}

fn backpropagate<S, M>(arena: &mut Arena<S, M>, leaf: NodeId, value: f64, survived: bool) {
    let mut cur = Some(leaf);
    while let Some(id) = cur {
        let node = arena.get_mut(id);
        node.record(value, survived);
        cur = node.parent;
    }
}
