//! bs-eval: Monte Carlo batches of simulated months, summarized as survival
//! probability and cash percentiles.

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use bs_core::{BusinessState, ModifierSource, MonthlyPolicy, SimulationEngine};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid batch options: {0}")]
    InvalidOptions(&'static str),
    #[error("unknown policy: {name}")]
    UnknownPolicy { name: String },
}

/// Which move every run plays each month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyPlan {
    /// The named catalog policy, every month.
    Fixed(String),
    /// A uniformly random catalog policy, drawn fresh each month.
    Random,
}

impl PolicyPlan {
    /// `"random"` selects [`PolicyPlan::Random`]; anything else is a policy name.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("random") {
            Self::Random
        } else {
            Self::Fixed(s.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Fixed(name) => name,
            Self::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    pub runs: u32,
    /// Every run steps exactly this many months, insolvent or not.
    pub months: u32,
    /// Run `i` is seeded with `seed + i`.
    pub seed: u64,
    /// Relative jitter on external modifiers.
    pub noise: f64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            runs: 50,
            months: 12,
            seed: 0,
            noise: 0.05,
        }
    }
}

impl BatchOptions {
    pub fn from_config(cfg: &bs_core::BatchConfig, seed: u64) -> Self {
        Self {
            runs: cfg.runs,
            months: cfg.months,
            seed: cfg.seed.unwrap_or(seed),
            noise: cfg.modifier_noise,
        }
    }

    fn validate(&self) -> Result<(), BatchError> {
        if self.runs == 0 {
            return Err(BatchError::InvalidOptions("runs must be > 0"));
        }
        if self.months == 0 {
            return Err(BatchError::InvalidOptions("months must be > 0"));
        }
        if !(0.0..1.0).contains(&self.noise) {
            return Err(BatchError::InvalidOptions("noise must be in [0, 1)"));
        }
        Ok(())
    }
}

/// Cash percentiles across runs at the end of one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCash {
    pub month: u32,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub policy: String,
    pub runs: u32,
    pub months: u32,
    pub seed: u64,
    /// Share of runs ending with `cash >= 0`.
    pub survival_probability: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub series: Vec<MonthlyCash>,
    /// Final cash per run, in run order.
    pub final_cash: Vec<f64>,
}

struct RunTrace {
    cash: Vec<f64>,
    survived: bool,
}

/// Run `opts.runs` independent trajectories from `initial` in parallel.
///
/// Each run owns its RNG, so the report does not depend on thread count or
/// scheduling order.
pub fn run_batch(
    engine: &SimulationEngine,
    initial: &BusinessState,
    plan: &PolicyPlan,
    modifiers: Option<&(dyn ModifierSource + Sync)>,
    opts: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    opts.validate()?;

    let moves: Arc<[MonthlyPolicy]> = match plan {
        PolicyPlan::Fixed(name) => match engine.policy(name) {
            Some(p) => Arc::from(vec![p.clone()]),
            None => return Err(BatchError::UnknownPolicy { name: name.clone() }),
        },
        PolicyPlan::Random => engine.legal_moves(),
    };
    if moves.is_empty() {
        return Err(BatchError::InvalidOptions("policy catalog is empty"));
    }

    let traces: Vec<RunTrace> = (0..opts.runs)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(opts.seed.wrapping_add(i as u64));
            run_one(engine, initial, &moves, modifiers, opts, &mut rng)
        })
        .collect();

    Ok(summarize(plan.label(), opts, &traces))
}

fn run_one(
    engine: &SimulationEngine,
    initial: &BusinessState,
    moves: &[MonthlyPolicy],
    modifiers: Option<&(dyn ModifierSource + Sync)>,
    opts: &BatchOptions,
    rng: &mut ChaCha8Rng,
) -> RunTrace {
    let mut state = initial.clone();
    let mut pending = Vec::new();
    let mut cash = Vec::with_capacity(opts.months as usize);

    for _ in 0..opts.months {
        let Some(policy) = moves.choose(rng) else {
            break;
        };
        let (next, queue) = engine.step(&state, &pending, policy, rng);
        state = next;
        pending = queue;
        if let Some(source) = modifiers {
            source.modifiers_for(&state).apply(&mut state, rng, opts.noise);
        }
        cash.push(state.cash);
    }

    RunTrace {
        cash,
        survived: engine.survived(&state),
    }
}

fn summarize(label: &str, opts: &BatchOptions, traces: &[RunTrace]) -> BatchReport {
    let final_cash: Vec<f64> = traces
        .iter()
        .map(|t| t.cash.last().copied().unwrap_or(f64::NAN))
        .collect();
    let survived = traces.iter().filter(|t| t.survived).count();

    let mut sorted = final_cash.clone();
    sorted.sort_by(f64::total_cmp);

    let series = (0..opts.months as usize)
        .map(|m| {
            let mut month: Vec<f64> = traces.iter().filter_map(|t| t.cash.get(m).copied()).collect();
            month.sort_by(f64::total_cmp);
            MonthlyCash {
                month: m as u32 + 1,
                p10: percentile(&month, 10.0),
                p50: percentile(&month, 50.0),
                p90: percentile(&month, 90.0),
            }
        })
        .collect();

    BatchReport {
        policy: label.to_string(),
        runs: opts.runs,
        months: opts.months,
        seed: opts.seed,
        survival_probability: survived as f64 / traces.len().max(1) as f64,
        p10: percentile(&sorted, 10.0),
        p50: percentile(&sorted, 50.0),
        p90: percentile(&sorted, 90.0),
        series,
        final_cash,
    }
}

/// Percentile `p` (0..=100) of ascending `sorted`, linearly interpolated
/// between closest ranks. NaN for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
