use crate::graph::{CausalEdge, CausalGraph, EffectEvent, EffectMode, LaggedEffect};
use crate::state::{BusinessState, Metric};

fn base_state() -> BusinessState {
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

fn saturation_graph(lag: u32) -> CausalGraph {
    CausalGraph::new().with_edge(
        CausalEdge::new(
            Metric::AdSpend,
            Metric::MarketSaturation,
            EffectMode::Set,
            |_, ad_spend| (ad_spend / 100_000.0).min(1.0),
            "saturation",
        )
        .lag(lag),
    )
}

#[test]
fn lag_one_edge_lands_the_following_month() {
    let graph = saturation_graph(1);

    let mut s = base_state();
    s.month = 1;
    s.ad_spend = 100_000.0;
    let p1 = graph.propagate(s, Vec::new());
    assert_eq!(p1.state.market_saturation, 0.0, "must not land in the trigger month");
    assert_eq!(p1.queue.len(), 1);

    let mut s = p1.state;
    s.month = 2;
    s.ad_spend = 0.0;
    let p2 = graph.propagate(s, p1.queue);
    assert_eq!(p2.state.market_saturation, 1.0);
    assert!(p2.queue.is_empty());
}

#[test]
fn lag_n_lands_exactly_n_passes_later() {
    for lag in 1..=4u32 {
        let graph = saturation_graph(lag);
        let mut s = base_state();
        s.ad_spend = 50_000.0;
        let mut p = graph.propagate(s, Vec::new());

        for pass in 1..=lag + 1 {
            let mut s = p.state;
            s.ad_spend = 0.0;
            p = graph.propagate(s, p.queue);
            let expected = if pass >= lag { 0.5 } else { 0.0 };
            assert_eq!(
                p.state.market_saturation, expected,
                "lag={lag} pass={pass}"
            );
        }
        assert!(p.queue.is_empty());
    }
}

#[test]
fn due_effects_apply_before_countdown() {
    let graph = CausalGraph::new();
    let queue = vec![
        LaggedEffect {
            target: Metric::Cac,
            value: 2.0,
            mode: EffectMode::Multiplicative,
            months_remaining: 0,
            source: Metric::MarketSaturation,
            description: "due",
        },
        LaggedEffect {
            target: Metric::Arpu,
            value: 5.0,
            mode: EffectMode::Additive,
            months_remaining: 2,
            source: Metric::MarketSaturation,
            description: "later",
        },
    ];
    let p = graph.propagate(base_state(), queue);
    assert_eq!(p.state.cac, 200.0);
    assert_eq!(p.state.arpu, 50.0);
    assert_eq!(p.queue.len(), 1);
    assert_eq!(p.queue[0].months_remaining, 1);
    assert_eq!(p.log.len(), 1);
    assert_eq!(p.log[0].event, EffectEvent::Applied);
}

#[test]
fn negligible_effects_are_skipped() {
    let graph = CausalGraph::new()
        .with_edge(CausalEdge::new(
            Metric::Cash,
            Metric::Cac,
            EffectMode::Multiplicative,
            |_, _| 1.0005,
            "tiny factor",
        ))
        .with_edge(
            CausalEdge::new(
                Metric::Cash,
                Metric::Burn,
                EffectMode::Additive,
                |_, _| 0.005,
                "tiny delta",
            )
            .lag(2),
        )
        .with_edge(CausalEdge::new(
            Metric::Cash,
            Metric::MarketSaturation,
            EffectMode::Set,
            |_, _| 0.0,
            "zero set",
        ));

    let before = base_state();
    let p = graph.propagate(before.clone(), Vec::new());
    assert_eq!(p.state, before);
    assert!(p.queue.is_empty());
    assert!(p.log.is_empty());
}

#[test]
fn threshold_gates_on_source_value() {
    let graph = CausalGraph::new().with_edge(
        CausalEdge::new(
            Metric::AdSpend,
            Metric::Cac,
            EffectMode::Multiplicative,
            |_, _| 0.5,
            "gated",
        )
        .threshold(50_000.0),
    );

    let mut s = base_state();
    s.ad_spend = 49_999.0;
    assert_eq!(graph.propagate(s.clone(), Vec::new()).state.cac, 100.0);

    s.ad_spend = 50_000.0;
    assert_eq!(graph.propagate(s, Vec::new()).state.cac, 50.0);
}

#[test]
fn effect_modes_apply() {
    assert_eq!(EffectMode::Additive.apply(2.0, 3.0), 5.0);
    assert_eq!(EffectMode::Multiplicative.apply(2.0, 3.0), 6.0);
    assert_eq!(EffectMode::Set.apply(2.0, 3.0), 3.0);
}

#[test]
fn prototype_blitz_month() {
    let graph = CausalGraph::prototype();
    assert_eq!(graph.len(), 9);

    let mut s = base_state();
    s.ad_spend = 80_000.0;
    let p = graph.propagate(s, Vec::new());

    assert_eq!(p.state.new_customers, 800);
    assert_eq!(p.state.burn, 28_000.0);
    assert!((p.state.cac - 95.0).abs() < 1e-9);
    assert!((p.state.rapid_growth - 0.8).abs() < 1e-9);
    // Saturation and culture are deferred.
    assert_eq!(p.state.market_saturation, 0.0);
    assert_eq!(p.state.cultural_degradation, 0.0);

    let queued: Vec<Metric> = p.queue.iter().map(|e| e.target).collect();
    assert_eq!(
        queued,
        vec![Metric::MarketSaturation, Metric::CulturalDegradation]
    );
    assert_eq!(p.queue[1].months_remaining, 2);

    let immediate = p
        .log
        .iter()
        .filter(|e| e.event == EffectEvent::Immediate)
        .count();
    assert_eq!(immediate, 4);
}

#[test]
fn prototype_idle_month_is_a_no_op() {
    let graph = CausalGraph::prototype();
    let s = base_state();
    let p = graph.propagate(s.clone(), Vec::new());
    assert_eq!(p.state, s);
    assert!(p.queue.is_empty());
}

#[test]
fn propagation_is_deterministic() {
    let graph = CausalGraph::prototype();
    let mut s = base_state();
    s.ad_spend = 65_000.0;
    s.market_saturation = 0.7;
    s.cultural_degradation = 0.2;

    let a = graph.propagate(s.clone(), Vec::new());
    let b = graph.propagate(s, Vec::new());
    assert_eq!(a.state, b.state);
    assert_eq!(a.queue, b.queue);
    assert_eq!(a.log, b.log);
}

#[test]
fn acquisition_is_zero_when_cac_is_not_positive() {
    let graph = CausalGraph::prototype();
    let mut s = base_state();
    s.ad_spend = 10_000.0;
    s.cac = 0.0;
    let p = graph.propagate(s, Vec::new());
    assert_eq!(p.state.new_customers, 0);
}
