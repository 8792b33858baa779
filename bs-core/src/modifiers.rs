//! Pre-computed strategic modifiers from an external supplier.
//!
//! The record is opaque to the causal engine; only the batch path applies it,
//! field by field, on top of a completed month.

use crate::state::BusinessState;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Shock probability per month is this fraction of `long_term_risk`.
pub const SHOCK_RATE: f64 = 0.1;
/// Revenue and traffic keep this share after a shock.
pub const SHOCK_RETENTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalModifiers {
    /// Monthly burn multiplier (1.01 = +1% per month).
    pub burn_multiplier: f64,
    /// Additive monthly ARPU change.
    #[serde(alias = "ARPU_shift")]
    pub arpu_shift: f64,
    /// Monthly CAC multiplier.
    #[serde(alias = "CAC_drift")]
    pub cac_drift: f64,
    #[serde(default)]
    pub strategic_penalty: f64,
    /// Probability-like score in [0, 1] driving shock events.
    pub long_term_risk: f64,
    /// Traffic multiplier.
    pub demand_adjustments: f64,
}

impl Default for ExternalModifiers {
    fn default() -> Self {
        Self {
            burn_multiplier: 1.0,
            arpu_shift: 0.0,
            cac_drift: 1.0,
            strategic_penalty: 0.0,
            long_term_risk: 0.0,
            demand_adjustments: 1.0,
        }
    }
}

impl ExternalModifiers {
    /// Apply the record to a finished month, each term jittered by `1 ± noise`.
    pub fn apply<R: Rng + ?Sized>(&self, state: &mut BusinessState, rng: &mut R, noise: f64) {
        let noise = noise.abs();
        state.burn *= self.burn_multiplier * jitter(rng, noise);
        state.arpu += self.arpu_shift * jitter(rng, noise);
        state.cac *= self.cac_drift * jitter(rng, noise);
        state.traffic = (state.traffic as f64 * self.demand_adjustments * jitter(rng, noise))
            .max(0.0)
            .trunc() as u64;

        if rng.gen::<f64>() < self.long_term_risk * SHOCK_RATE {
            state.revenue *= SHOCK_RETENTION;
            state.traffic = (state.traffic as f64 * SHOCK_RETENTION).trunc() as u64;
        }
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, noise: f64) -> f64 {
    if noise > 0.0 {
        rng.gen_range(1.0 - noise..=1.0 + noise)
    } else {
        1.0
    }
}

/// Anything that can hand the simulation a modifier record for a state.
pub trait ModifierSource {
    fn modifiers_for(&self, state: &BusinessState) -> ExternalModifiers;
}

/// Fixed record, e.g. cached from an earlier external call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticModifiers(pub ExternalModifiers);

impl ModifierSource for StaticModifiers {
    fn modifiers_for(&self, _state: &BusinessState) -> ExternalModifiers {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn state() -> BusinessState {
        BusinessState {
            cash: 0.0,
            customers: 10,
            ad_spend: 0.0,
            burn: 1000.0,
            arpu: 50.0,
            cac: 100.0,
            revenue: 500.0,
            runway: 0.0,
            new_customers: 0,
            churned_customers: 0,
            churn_rate: 0.05,
            traffic: 1000,
            market_saturation: 0.0,
            cultural_degradation: 0.0,
            rapid_growth: 0.0,
            month: 0,
        }
    }

    #[test]
    fn parses_external_field_spellings() {
        let json = r#"{
            "burn_multiplier": 1.01,
            "ARPU_shift": -0.1,
            "CAC_drift": 1.02,
            "strategic_penalty": 3.0,
            "long_term_risk": 0.4,
            "demand_adjustments": 0.9
        }"#;
        let m: ExternalModifiers = serde_yaml::from_str(json).unwrap();
        assert_eq!(m.arpu_shift, -0.1);
        assert_eq!(m.cac_drift, 1.02);
    }

    #[test]
    fn noiseless_application_is_exact() {
        let m = ExternalModifiers {
            burn_multiplier: 1.1,
            arpu_shift: -5.0,
            cac_drift: 1.5,
            strategic_penalty: 0.0,
            long_term_risk: 0.0,
            demand_adjustments: 0.5,
        };
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        m.apply(&mut s, &mut rng, 0.0);
        assert!((s.burn - 1100.0).abs() < 1e-9);
        assert_eq!(s.arpu, 45.0);
        assert_eq!(s.cac, 150.0);
        assert_eq!(s.traffic, 500);
        assert_eq!(s.revenue, 500.0);
    }

    #[test]
    fn certain_risk_triggers_shock_at_rate() {
        let m = ExternalModifiers {
            long_term_risk: 1.0,
            ..ExternalModifiers::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let shocks = (0..10_000)
            .filter(|_| {
                let mut s = state();
                m.apply(&mut s, &mut rng, 0.0);
                s.revenue < 500.0
            })
            .count();
        assert!((800..1200).contains(&shocks), "shocks={shocks}");
    }

    #[test]
    fn static_source_returns_its_record() {
        let src = StaticModifiers(ExternalModifiers::default());
        assert_eq!(src.modifiers_for(&state()), ExternalModifiers::default());
    }
}
