//! Integrity constraints on [`BusinessState`].
//!
//! Cash and runway are never clamped: negative values mean debt and insolvency.

use crate::state::{BusinessState, Metric};
use serde::Serialize;

/// CAC never drops below this after enforcement.
pub const MIN_CAC: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    NonNegative,
    RateBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintViolation {
    pub metric: Metric,
    pub value: f64,
    pub constraint: ConstraintKind,
    pub month: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<ConstraintViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

const NON_NEGATIVE: [Metric; 9] = [
    Metric::Customers,
    Metric::NewCustomers,
    Metric::ChurnedCustomers,
    Metric::Revenue,
    Metric::Burn,
    Metric::AdSpend,
    Metric::Cac,
    Metric::Arpu,
    Metric::Traffic,
];

pub fn validate(state: &BusinessState) -> ValidationReport {
    let mut report = ValidationReport::default();
    for metric in NON_NEGATIVE {
        let value = state.get(metric);
        if value < 0.0 {
            report.violations.push(ConstraintViolation {
                metric,
                value,
                constraint: ConstraintKind::NonNegative,
                month: state.month,
            });
        }
    }
    if !(0.0..=1.0).contains(&state.churn_rate) {
        report.violations.push(ConstraintViolation {
            metric: Metric::ChurnRate,
            value: state.churn_rate,
            constraint: ConstraintKind::RateBounds,
            month: state.month,
        });
    }
    report
}

/// Clamp every constrained field to its nearest valid bound.
pub fn enforce(state: &mut BusinessState) {
    state.revenue = state.revenue.max(0.0);
    state.burn = state.burn.max(0.0);
    state.ad_spend = state.ad_spend.max(0.0);
    state.cac = state.cac.max(MIN_CAC);
    state.arpu = state.arpu.max(0.0);
    state.churn_rate = state.churn_rate.clamp(0.0, 1.0);
}

pub fn validate_and_enforce(mut state: BusinessState) -> (BusinessState, ValidationReport) {
    let report = validate(&state);
    enforce(&mut state);
    (state, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> BusinessState {
        BusinessState {
            cash: -10.0,
            customers: 5,
            ad_spend: -1.0,
            burn: -2.0,
            arpu: -3.0,
            cac: 0.0,
            revenue: -4.0,
            runway: -7.0,
            new_customers: 0,
            churned_customers: 0,
            churn_rate: 1.7,
            traffic: 0,
            market_saturation: 0.0,
            cultural_degradation: 0.0,
            rapid_growth: 0.0,
            month: 3,
        }
    }

    #[test]
    fn reports_each_violation() {
        let report = validate(&state());
        let metrics: Vec<Metric> = report.violations.iter().map(|v| v.metric).collect();
        assert_eq!(
            metrics,
            vec![
                Metric::Revenue,
                Metric::Burn,
                Metric::AdSpend,
                Metric::Arpu,
                Metric::ChurnRate
            ]
        );
        assert!(report.violations.iter().all(|v| v.month == 3));
        assert!(!report.is_valid());
    }

    #[test]
    fn zero_cac_is_valid_but_clamped() {
        let mut s = state();
        assert!(!validate(&s).violations.iter().any(|v| v.metric == Metric::Cac));
        enforce(&mut s);
        assert_eq!(s.cac, MIN_CAC);
    }

    #[test]
    fn enforcement_clamps_but_leaves_cash_and_runway() {
        let (s, report) = validate_and_enforce(state());
        assert!(!report.is_valid());
        assert_eq!(s.revenue, 0.0);
        assert_eq!(s.burn, 0.0);
        assert_eq!(s.ad_spend, 0.0);
        assert_eq!(s.arpu, 0.0);
        assert_eq!(s.churn_rate, 1.0);
        assert_eq!(s.cash, -10.0);
        assert_eq!(s.runway, -7.0);
        assert!(validate(&s).is_valid());
    }
}
