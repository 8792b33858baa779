use crate::state::{BusinessState, Metric, LTV_CAP_MONTHS};

fn sample_state() -> BusinessState {
    BusinessState {
        cash: 500_000.0,
        customers: 1000,
        ad_spend: 0.0,
        burn: 20_000.0,
        arpu: 50.0,
        cac: 100.0,
        revenue: 0.0,
        runway: 0.0,
        new_customers: 0,
        churned_customers: 0,
        churn_rate: 0.05,
        traffic: 0,
        market_saturation: 0.0,
        cultural_degradation: 0.0,
        rapid_growth: 0.0,
        month: 0,
    }
}

#[test]
fn get_set_round_trips_every_float_metric() {
    let mut s = sample_state();
    for m in Metric::ALL {
        s.set(m, 7.0);
        assert_eq!(s.get(m), 7.0, "metric {m}");
    }
}

#[test]
fn count_metrics_truncate_and_floor_at_zero() {
    let mut s = sample_state();
    s.set(Metric::NewCustomers, 12.9);
    assert_eq!(s.new_customers, 12);
    s.set(Metric::Customers, -40.0);
    assert_eq!(s.customers, 0);
    s.set(Metric::Traffic, f64::NAN);
    assert_eq!(s.traffic, 0);
}

#[test]
fn ltv_caps_when_churn_is_zero() {
    let mut s = sample_state();
    assert!((s.ltv() - 1000.0).abs() < 1e-9);
    s.churn_rate = 0.0;
    assert_eq!(s.ltv(), 50.0 * LTV_CAP_MONTHS);
}

#[test]
fn metric_names_parse_back() {
    for m in Metric::ALL {
        assert_eq!(m.as_str().parse::<Metric>().unwrap(), m);
    }
    let err = "conversion_rate".parse::<Metric>().unwrap_err();
    assert_eq!(err.to_string(), "unknown metric 'conversion_rate'");
}

#[test]
fn clone_does_not_alias() {
    let a = sample_state();
    let mut b = a.clone();
    b.cash = -1.0;
    assert_eq!(a.cash, 500_000.0);
}
