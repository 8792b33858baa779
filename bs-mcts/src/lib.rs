//! Monte Carlo Tree Search (UCB1) over the business simulation.
//!
//! The design uses:
//! - An `Environment` trait as the seam, implemented by `bs_core::SimulationEngine`
//! - Arena-backed node storage with index links to parents and children
//! - Random rollouts scored by the environment, with a separate survival tally
//! - Robust-child (most visits) final selection

pub mod arena;
pub mod env;
pub mod mcts;
pub mod node;

pub use env::{Environment, SimState};
pub use mcts::{ChildSummary, Mcts, MctsConfig, MctsError, SearchResult, SearchStats};
pub use node::ucb1;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod mcts_tests;
