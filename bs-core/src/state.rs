//! Monthly business snapshot and field addressing by [`Metric`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Runway reported when total monthly spend is zero.
pub const RUNWAY_SENTINEL: f64 = 999.0;

/// Effective CAC used when a conversion multiplier collapses to zero or below.
pub const CAC_SENTINEL: f64 = 9999.0;

/// LTV is capped at this many months of ARPU when churn is zero.
pub const LTV_CAP_MONTHS: f64 = 100.0;

/// One month of the business.
///
/// Treated as an immutable value: transitions clone it before mutating, so no
/// two trajectories ever share an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessState {
    /// Signed; negative cash is debt.
    pub cash: f64,
    pub customers: u64,
    pub ad_spend: f64,
    pub burn: f64,
    pub arpu: f64,
    pub cac: f64,
    #[serde(default)]
    pub revenue: f64,
    /// Months of cash left at current spend, or [`RUNWAY_SENTINEL`].
    #[serde(default)]
    pub runway: f64,

    #[serde(default)]
    pub new_customers: u64,
    #[serde(default)]
    pub churned_customers: u64,
    pub churn_rate: f64,
    #[serde(default)]
    pub traffic: u64,

    // Latent scores produced by the causal graph, roughly in [0, 1].
    #[serde(default)]
    pub market_saturation: f64,
    #[serde(default)]
    pub cultural_degradation: f64,
    #[serde(default)]
    pub rapid_growth: f64,

    #[serde(default)]
    pub month: u32,
}

impl BusinessState {
    /// Derived lifetime value: `arpu / churn_rate`, capped when churn is zero.
    pub fn ltv(&self) -> f64 {
        if self.churn_rate > 0.0 {
            self.arpu / self.churn_rate
        } else {
            self.arpu * LTV_CAP_MONTHS
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cash => self.cash,
            Metric::Customers => self.customers as f64,
            Metric::AdSpend => self.ad_spend,
            Metric::Burn => self.burn,
            Metric::Arpu => self.arpu,
            Metric::Cac => self.cac,
            Metric::Revenue => self.revenue,
            Metric::Runway => self.runway,
            Metric::NewCustomers => self.new_customers as f64,
            Metric::ChurnedCustomers => self.churned_customers as f64,
            Metric::ChurnRate => self.churn_rate,
            Metric::Traffic => self.traffic as f64,
            Metric::MarketSaturation => self.market_saturation,
            Metric::CulturalDegradation => self.cultural_degradation,
            Metric::RapidGrowth => self.rapid_growth,
        }
    }

    /// Overwrite one field. Count fields truncate toward zero and floor at 0.
    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Cash => self.cash = value,
            Metric::Customers => self.customers = to_count(value),
            Metric::AdSpend => self.ad_spend = value,
            Metric::Burn => self.burn = value,
            Metric::Arpu => self.arpu = value,
            Metric::Cac => self.cac = value,
            Metric::Revenue => self.revenue = value,
            Metric::Runway => self.runway = value,
            Metric::NewCustomers => self.new_customers = to_count(value),
            Metric::ChurnedCustomers => self.churned_customers = to_count(value),
            Metric::ChurnRate => self.churn_rate = value,
            Metric::Traffic => self.traffic = to_count(value),
            Metric::MarketSaturation => self.market_saturation = value,
            Metric::CulturalDegradation => self.cultural_degradation = value,
            Metric::RapidGrowth => self.rapid_growth = value,
        }
    }
}

// `as` saturates and maps NaN to 0.
fn to_count(value: f64) -> u64 {
    value.max(0.0).trunc() as u64
}

/// Every numeric field of [`BusinessState`] that edges, decisions and priors can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cash,
    Customers,
    AdSpend,
    Burn,
    Arpu,
    Cac,
    Revenue,
    Runway,
    NewCustomers,
    ChurnedCustomers,
    ChurnRate,
    Traffic,
    MarketSaturation,
    CulturalDegradation,
    RapidGrowth,
}

impl Metric {
    pub const ALL: [Metric; 15] = [
        Metric::Cash,
        Metric::Customers,
        Metric::AdSpend,
        Metric::Burn,
        Metric::Arpu,
        Metric::Cac,
        Metric::Revenue,
        Metric::Runway,
        Metric::NewCustomers,
        Metric::ChurnedCustomers,
        Metric::ChurnRate,
        Metric::Traffic,
        Metric::MarketSaturation,
        Metric::CulturalDegradation,
        Metric::RapidGrowth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cash => "cash",
            Metric::Customers => "customers",
            Metric::AdSpend => "ad_spend",
            Metric::Burn => "burn",
            Metric::Arpu => "arpu",
            Metric::Cac => "cac",
            Metric::Revenue => "revenue",
            Metric::Runway => "runway",
            Metric::NewCustomers => "new_customers",
            Metric::ChurnedCustomers => "churned_customers",
            Metric::ChurnRate => "churn_rate",
            Metric::Traffic => "traffic",
            Metric::MarketSaturation => "market_saturation",
            Metric::CulturalDegradation => "cultural_degradation",
            Metric::RapidGrowth => "rapid_growth",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}
