//! Search tree nodes and their statistics.

pub type NodeId = u32;

#[derive(Debug, Clone)]
pub struct Node<S, M> {
    pub state: S,
    pub parent: Option<NodeId>,
    /// Move that led here from `parent`.
    pub mv: Option<M>,
    pub children: Vec<NodeId>,
    /// Moves not yet expanded into children; popped from the back.
    pub untried: Vec<M>,
    pub is_terminal: bool,

    pub visits: u32,
    pub value: f64,
    pub survival_wins: u32,
}

impl<S, M> Node<S, M> {
    pub fn new(state: S, parent: Option<NodeId>, mv: Option<M>, untried: Vec<M>, is_terminal: bool) -> Self {
        Self {
            state,
            parent,
            mv,
            children: Vec::new(),
            untried,
            is_terminal,
            visits: 0,
            value: 0.0,
            survival_wins: 0,
        }
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.untried.is_empty()
    }

    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value / self.visits as f64
        }
    }

    pub fn survival_rate(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.survival_wins as f64 / self.visits as f64
        }
    }

    pub fn record(&mut self, value: f64, survived: bool) {
        self.visits += 1;
        self.value += value;
        if survived {
            self.survival_wins += 1;
        }
    }
}

/// UCB1 score of a child. Unvisited children score `+inf`.
pub fn ucb1(value: f64, visits: u32, parent_visits: u32, exploration: f64) -> f64 {
    if visits == 0 {
        return f64::INFINITY;
    }
    let n = visits as f64;
    let parent = (parent_visits.max(1)) as f64;
    value / n + exploration * (parent.ln() / n).sqrt()
}
