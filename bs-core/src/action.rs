//! Strategic action space: decision axes discretized into named bands, each band
//! optionally carrying probabilistic priors on downstream metrics, composed into
//! full monthly policies by Cartesian product.

use crate::state::Metric;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Independent per-draw probability of a fat-tail shock.
pub const FAT_TAIL_SHOCK_PROB: f64 = 0.05;
/// Shock factor range applied on top of the log-normal draw.
pub const FAT_TAIL_SHOCK_RANGE: (f64, f64) = (1.5, 3.0);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionSpaceError {
    #[error("decision axis '{axis}' is not defined")]
    UndefinedAxis { axis: Metric },
    #[error("decision axis '{axis}' has no strategic groups")]
    EmptyAxis { axis: Metric },
    #[error("group '{group}': invalid interval [{min}, {max}]")]
    InvalidInterval { group: String, min: f64, max: f64 },
    #[error("group '{group}': logarithmic prior needs a positive mean, got {mean}")]
    NonPositiveMean { group: String, mean: f64 },
    #[error("group '{group}': sigma must be finite and >= 0, got {sigma}")]
    InvalidSigma { group: String, sigma: f64 },
}

/// Shape of a prior's outcome distribution. `mean` is a multiplier on a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriorDistribution {
    Deterministic { mean: f64 },
    /// Log-normal whose expected value equals `mean`.
    LogNormal { mean: f64, sigma: f64 },
    /// Normal around `mean`, clipped at zero.
    SalesNormal { mean: f64, sigma: f64 },
    /// Log-normal plus an occasional multiplicative shock.
    FatTailed { mean: f64, sigma: f64 },
}

impl PriorDistribution {
    pub fn mean(&self) -> f64 {
        match *self {
            PriorDistribution::Deterministic { mean }
            | PriorDistribution::LogNormal { mean, .. }
            | PriorDistribution::SalesNormal { mean, .. }
            | PriorDistribution::FatTailed { mean, .. } => mean,
        }
    }

    pub fn sample_multiplier<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            PriorDistribution::Deterministic { mean } => mean,
            PriorDistribution::LogNormal { mean, sigma } => log_normal(mean, sigma, rng),
            PriorDistribution::SalesNormal { mean, sigma } => {
                let z: f64 = StandardNormal.sample(rng);
                (mean + sigma * z).max(0.0)
            }
            PriorDistribution::FatTailed { mean, sigma } => {
                let basis = log_normal(mean, sigma, rng);
                if rng.gen::<f64>() < FAT_TAIL_SHOCK_PROB {
                    let (lo, hi) = FAT_TAIL_SHOCK_RANGE;
                    basis * rng.gen_range(lo..=hi)
                } else {
                    basis
                }
            }
        }
    }

    fn validate(&self, group: &str) -> Result<(), ActionSpaceError> {
        let (mean, sigma, logarithmic) = match *self {
            PriorDistribution::Deterministic { mean } => (mean, 0.0, false),
            PriorDistribution::SalesNormal { mean, sigma } => (mean, sigma, false),
            PriorDistribution::LogNormal { mean, sigma }
            | PriorDistribution::FatTailed { mean, sigma } => (mean, sigma, true),
        };
        if !mean.is_finite() || (logarithmic && mean <= 0.0) {
            return Err(ActionSpaceError::NonPositiveMean {
                group: group.to_string(),
                mean,
            });
        }
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(ActionSpaceError::InvalidSigma {
                group: group.to_string(),
                sigma,
            });
        }
        Ok(())
    }
}

// E[X] = exp(mu + sigma^2 / 2) = mean.
fn log_normal<R: Rng + ?Sized>(mean: f64, sigma: f64, rng: &mut R) -> f64 {
    let mu = mean.ln() - sigma * sigma / 2.0;
    let z: f64 = StandardNormal.sample(rng);
    (mu + sigma * z).exp()
}

/// Downstream variable a prior acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorTarget {
    /// `cac = baseline_cac * multiplier`.
    Cac,
    /// Applied inversely onto the current CAC: `cac = cac / multiplier`.
    ConversionRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub target: PriorTarget,
    pub distribution: PriorDistribution,
}

/// A named band `[min, max]` for one decision variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicGroup {
    pub name: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priors: Vec<Prior>,
}

impl StrategicGroup {
    pub fn new(name: impl Into<String>, min: f64, max: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            description: description.into(),
            priors: Vec::new(),
        }
    }

    /// Degenerate band `[value, value]`.
    pub fn fixed(name: impl Into<String>, value: f64, description: impl Into<String>) -> Self {
        Self::new(name, value, value, description)
    }

    pub fn with_prior(mut self, target: PriorTarget, distribution: PriorDistribution) -> Self {
        self.priors.push(Prior {
            target,
            distribution,
        });
        self
    }

    /// Uniform draw from the band; degenerate bands return their single value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn validate(&self) -> Result<(), ActionSpaceError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min <= self.max) {
            return Err(ActionSpaceError::InvalidInterval {
                group: self.name.clone(),
                min: self.min,
                max: self.max,
            });
        }
        for prior in &self.priors {
            prior.distribution.validate(&self.name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub axis: Metric,
    pub group: Arc<StrategicGroup>,
}

/// One full monthly decision: a band chosen on every axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPolicy {
    pub name: String,
    pub decisions: Vec<Decision>,
}

impl MonthlyPolicy {
    pub fn description(&self) -> String {
        self.decisions
            .iter()
            .map(|d| d.group.description.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    pub fn group(&self, axis: Metric) -> Option<&StrategicGroup> {
        self.decisions
            .iter()
            .find(|d| d.axis == axis)
            .map(|d| d.group.as_ref())
    }
}

/// Serializable description of one decision axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub axis: Metric,
    pub groups: Vec<StrategicGroup>,
}

/// Registry of decision axes, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Discretizer {
    axes: Vec<(Metric, Vec<Arc<StrategicGroup>>)>,
}

impl Discretizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[AxisSpec]) -> Result<Self, ActionSpaceError> {
        let mut d = Self::new();
        for spec in specs {
            d.add_variable(spec.axis, spec.groups.clone())?;
        }
        Ok(d)
    }

    /// Register (or replace, keeping its position) the bands for one axis.
    pub fn add_variable(
        &mut self,
        axis: Metric,
        groups: Vec<StrategicGroup>,
    ) -> Result<(), ActionSpaceError> {
        if groups.is_empty() {
            return Err(ActionSpaceError::EmptyAxis { axis });
        }
        for g in &groups {
            g.validate()?;
        }
        let groups: Vec<Arc<StrategicGroup>> = groups.into_iter().map(Arc::new).collect();
        match self.axes.iter_mut().find(|(a, _)| *a == axis) {
            Some(slot) => slot.1 = groups,
            None => self.axes.push((axis, groups)),
        }
        Ok(())
    }

    pub fn groups(&self, axis: Metric) -> Result<&[Arc<StrategicGroup>], ActionSpaceError> {
        self.axes
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, g)| g.as_slice())
            .ok_or(ActionSpaceError::UndefinedAxis { axis })
    }

    pub fn axes(&self) -> impl Iterator<Item = Metric> + '_ {
        self.axes.iter().map(|(a, _)| *a)
    }

    pub fn policy_count(&self) -> usize {
        self.axes.iter().map(|(_, g)| g.len()).product()
    }

    pub fn to_specs(&self) -> Vec<AxisSpec> {
        self.axes
            .iter()
            .map(|(axis, groups)| AxisSpec {
                axis: *axis,
                groups: groups.iter().map(|g| g.as_ref().clone()).collect(),
            })
            .collect()
    }

    /// Cartesian product over all axes; the last axis varies fastest.
    ///
    /// With no axes registered this is the single empty policy.
    pub fn generate_all_policies(&self) -> Vec<MonthlyPolicy> {
        let total = self.policy_count();
        let mut out = Vec::with_capacity(total);
        let mut idx = vec![0usize; self.axes.len()];

        for _ in 0..total {
            let decisions: Vec<Decision> = self
                .axes
                .iter()
                .zip(&idx)
                .map(|((axis, groups), &i)| Decision {
                    axis: *axis,
                    group: Arc::clone(&groups[i]),
                })
                .collect();
            let name = decisions
                .iter()
                .map(|d| d.group.name.as_str())
                .collect::<Vec<_>>()
                .join(" + ");
            out.push(MonthlyPolicy { name, decisions });

            // Odometer increment.
            for k in (0..idx.len()).rev() {
                idx[k] += 1;
                if idx[k] < self.axes[k].1.len() {
                    break;
                }
                idx[k] = 0;
            }
        }
        out
    }
}

/// The reference catalog: five ad-spend bands priced against five price points.
pub fn default_discretizer() -> Discretizer {
    use PriorDistribution::{FatTailed, LogNormal};
    use PriorTarget::{Cac, ConversionRate};

    let spend = vec![
        StrategicGroup::fixed("Pause", 0.0, "Stop spending"),
        StrategicGroup::fixed("Probe", 10_000.0, "Test channels")
            .with_prior(Cac, LogNormal { mean: 0.9, sigma: 0.05 }),
        StrategicGroup::fixed("Grow", 25_000.0, "Scale up")
            .with_prior(Cac, LogNormal { mean: 1.0, sigma: 0.10 }),
        StrategicGroup::fixed("Aggressive", 50_000.0, "Market share")
            .with_prior(Cac, LogNormal { mean: 1.2, sigma: 0.20 }),
        StrategicGroup::fixed("Blitz", 80_000.0, "Dominate")
            .with_prior(Cac, FatTailed { mean: 1.4, sigma: 0.40 }),
    ];

    let price = vec![
        StrategicGroup::fixed("Economy", 20.0, "Mass market")
            .with_prior(ConversionRate, LogNormal { mean: 1.25, sigma: 0.05 }),
        StrategicGroup::fixed("Standard", 40.0, "Market entry")
            .with_prior(ConversionRate, LogNormal { mean: 1.0, sigma: 0.10 }),
        StrategicGroup::fixed("Plus", 60.0, "Upsell")
            .with_prior(ConversionRate, LogNormal { mean: 0.85, sigma: 0.15 }),
        StrategicGroup::fixed("Premium", 80.0, "High value")
            .with_prior(ConversionRate, LogNormal { mean: 0.65, sigma: 0.25 }),
        StrategicGroup::fixed("Elite", 120.0, "Niche/Enterprise")
            .with_prior(ConversionRate, FatTailed { mean: 0.40, sigma: 0.50 }),
    ];

    let mut d = Discretizer::new();
    for (axis, groups) in [(Metric::AdSpend, spend), (Metric::Arpu, price)] {
        let groups: Vec<Arc<StrategicGroup>> = groups.into_iter().map(Arc::new).collect();
        d.axes.push((axis, groups));
    }
    d
}
