//! bs: CLI binary for the strategic business simulator.
//!
//! Subcommands:
//! - advise   search and execute month by month over the horizon
//! - moves    list the policy catalog
//! - graph    list the causal edges
//! - batch    Monte Carlo survival / cash percentiles for one plan

use std::env;
use std::process;
use std::str::FromStr;

use bs_core::{BusinessState, Config, ExternalModifiers, Metric, SimulationEngine, StaticModifiers};
use bs_eval::{run_batch, BatchOptions, PolicyPlan};
use bs_logging::{
    hash_config_bytes, now_ms, try_git_hash, BatchSummaryEventV1, ChildSummaryV1, NdjsonWriter,
    RunStartEventV1, SearchDecisionEventV1, StepEventV1, EVENT_SCHEMA_VERSION,
};
use bs_mcts::{Mcts, MctsConfig, SimState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn print_help() {
    eprintln!(
        r#"bs - strategic business simulator

USAGE:
    bs <COMMAND> [OPTIONS]

COMMANDS:
    advise      Recommend and play a policy each month until the horizon
    moves       List the monthly policy catalog
    graph       List the causal effect graph
    batch       Monte Carlo runs of one policy (or random play)

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `bs <COMMAND> --help` for command options.
"#
    );
}

fn print_version() {
    println!("bs {}", env!("CARGO_PKG_VERSION"));
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

/// Parse the value following `args[i]`.
fn flag_value<T: FromStr>(args: &[String], i: usize) -> T {
    let flag = &args[i];
    let Some(raw) = args.get(i + 1) else {
        fail(format!("Missing value for {flag}"));
    };
    raw.parse()
        .unwrap_or_else(|_| fail(format!("Invalid {flag} value: {raw}")))
}

/// Load `path` (or the built-in defaults) and its content hash.
fn load_config(path: Option<&str>) -> (Config, Option<String>) {
    match path {
        Some(p) => {
            let bytes = std::fs::read(p).unwrap_or_else(|e| fail(format!("Failed to read {p}: {e}")));
            let text = String::from_utf8_lossy(&bytes);
            let cfg = Config::from_yaml(&text).unwrap_or_else(|e| fail(format!("{p}: {e}")));
            (cfg, Some(hash_config_bytes(&bytes)))
        }
        None => (Config::default(), None),
    }
}

fn build_engine(cfg: &Config) -> SimulationEngine {
    SimulationEngine::from_config(cfg).unwrap_or_else(|e| fail(e))
}

fn open_log(path: Option<&str>) -> Option<NdjsonWriter> {
    path.map(|p| {
        NdjsonWriter::open_append_with_flush(p, 1).unwrap_or_else(|e| fail(format!("Failed to open log {p}: {e}")))
    })
}

fn log_event<T: serde::Serialize>(log: &mut Option<NdjsonWriter>, event: &T) {
    if let Some(w) = log.as_mut() {
        if let Err(e) = w.write_event(event) {
            fail(e);
        }
    }
}

fn print_status(s: &BusinessState) {
    println!(
        "  month {:>2} | cash {:>12.0} | customers {:>6} (+{}, -{}) | revenue {:>9.0} | burn {:>9.0} | ad {:>7.0}",
        s.month, s.cash, s.customers, s.new_customers, s.churned_customers, s.revenue, s.burn, s.ad_spend
    );
    println!(
        "           runway {:>6.1} mo | cac {:>8.2} | arpu {:>6.2} | ltv {:>8.0} | churn {:.3} | saturation {:.2} | culture {:.2}",
        s.runway,
        s.cac,
        s.arpu,
        s.ltv(),
        s.churn_rate,
        s.market_saturation,
        s.cultural_degradation
    );
}

fn cmd_advise(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut iterations: Option<u32> = None;
    let mut seed: Option<u64> = None;
    let mut log_path: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"bs advise

USAGE:
    bs advise [--config PATH] [--iterations N] [--seed S] [--log PATH]

OPTIONS:
    --config PATH     YAML config (default: built-in reference setup)
    --iterations N    Search iterations per month (default: search.iterations)
    --seed S          Seed for search and execution (default: search.seed)
    --log PATH        Append NDJSON events to PATH
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(flag_value(args, i));
                i += 2;
            }
            "--iterations" => {
                iterations = Some(flag_value(args, i));
                i += 2;
            }
            "--seed" => {
                seed = Some(flag_value(args, i));
                i += 2;
            }
            "--log" => {
                log_path = Some(flag_value(args, i));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `bs advise`: {}", other);
                eprintln!("Run `bs advise --help` for usage.");
                process::exit(1);
            }
        }
    }

    let (cfg, config_hash) = load_config(config_path.as_deref());
    let engine = build_engine(&cfg);

    let mut mcts_cfg = MctsConfig::from(&cfg.search);
    if let Some(n) = iterations {
        mcts_cfg.iterations = n;
    }
    if let Some(s) = seed {
        mcts_cfg.seed = s;
    }
    let mut mcts = Mcts::new(mcts_cfg).unwrap_or_else(|e| fail(e));
    // Execution draws must not perturb the search stream.
    let mut exec_rng = ChaCha8Rng::seed_from_u64(mcts_cfg.seed ^ 0x9E37_79B9_7F4A_7C15);

    let mut log = open_log(log_path.as_deref());
    log_event(
        &mut log,
        &RunStartEventV1 {
            event: "run_start",
            ts_ms: now_ms(),
            schema_version: EVENT_SCHEMA_VERSION,
            command: "advise".to_string(),
            config_hash,
            git_hash: try_git_hash(),
            horizon_months: cfg.simulation.horizon_months,
            policy_count: engine.legal_moves().len(),
            seed: mcts_cfg.seed,
        },
    );

    let (mut state, mut pending) = engine.initial_state();
    println!(
        "Planning {} months over {} policies ({} iterations per decision)",
        cfg.simulation.horizon_months,
        engine.legal_moves().len(),
        mcts_cfg.iterations
    );
    print_status(&state);

    while !engine.is_terminal(&state) {
        let month = state.month + 1;
        let res = mcts.run_search(&engine, SimState::new(state.clone(), pending.clone()));

        log_event(
            &mut log,
            &SearchDecisionEventV1 {
                event: "search_decision",
                ts_ms: now_ms(),
                schema_version: EVENT_SCHEMA_VERSION,
                month,
                chosen_policy: res.best_move.as_ref().map(|p| p.name.clone()),
                survival_probability: res.survival_probability,
                visits: res.visits,
                mean_value: res.mean_value,
                used_fallback: res.used_fallback,
                iterations: mcts_cfg.iterations,
                node_count: res.stats.node_count,
                rollouts: res.stats.rollouts,
                rollout_steps: res.stats.rollout_steps,
                children: res
                    .children
                    .iter()
                    .map(|c| ChildSummaryV1 {
                        policy: c.mv.name.clone(),
                        visits: c.visits,
                        mean_value: c.mean_value,
                        survival_probability: c.survival_probability,
                    })
                    .collect(),
            },
        );

        let Some(policy) = res.best_move else {
            fail("No legal policies to play");
        };
        println!();
        println!(
            "Month {month}: {} ({}){}",
            policy.name,
            policy.description(),
            if res.used_fallback { " [random fallback]" } else { "" }
        );
        println!(
            "  survival {:.1}% over {} visits, mean score {:.2}",
            res.survival_probability * 100.0,
            res.visits,
            res.mean_value
        );

        let outcome = engine.step_traced(&state, &pending, &policy, &mut exec_rng);
        log_event(&mut log, &StepEventV1::from_outcome(&policy.name, &outcome));
        for v in &outcome.report.violations {
            println!("  clamped {} = {:.3} ({:?})", v.metric, v.value, v.constraint);
        }
        state = outcome.state;
        pending = outcome.effects;
        print_status(&state);
    }

    println!();
    if engine.survived(&state) {
        println!("Survived {} months with {:.0} cash.", state.month, state.cash);
    } else {
        println!("Insolvent in month {} ({:.0} cash).", state.month, state.cash);
    }
}

fn cmd_moves(args: &[String]) {
    let mut config_path: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"bs moves

USAGE:
    bs moves [--config PATH]
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(flag_value(args, i));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `bs moves`: {}", other);
                process::exit(1);
            }
        }
    }

    let (cfg, _) = load_config(config_path.as_deref());
    let engine = build_engine(&cfg);
    for (idx, policy) in engine.legal_moves().iter().enumerate() {
        println!("{:>3}  {}", idx, policy.name);
        for d in &policy.decisions {
            let g = &d.group;
            let band = if g.min == g.max {
                format!("{}", g.min)
            } else {
                format!("[{}, {}]", g.min, g.max)
            };
            print!("       {} = {}", d.axis, band);
            for p in &g.priors {
                print!("  {:?} x {:?}", p.target, p.distribution);
            }
            println!();
        }
    }
}

fn cmd_graph(args: &[String]) {
    let mut metric: Option<Metric> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"bs graph

USAGE:
    bs graph [--metric NAME]

OPTIONS:
    --metric NAME       Only edges whose source or target is NAME (e.g. churn_rate)
"#
                );
                return;
            }
            "--metric" => {
                let Some(raw) = args.get(i + 1) else {
                    fail("Missing value for --metric");
                };
                metric = Some(raw.parse().unwrap_or_else(|e| fail(e)));
                i += 2;
            }
            other => fail(format!("Unknown option for `bs graph`: {other}")),
        }
    }

    let graph = bs_core::CausalGraph::prototype();
    for (idx, e) in graph.edges().iter().enumerate() {
        if metric.is_some_and(|m| e.source != m && e.target != m) {
            continue;
        }
        let threshold = e
            .threshold
            .map(|t| format!(" if >= {t}"))
            .unwrap_or_default();
        println!(
            "{:>2}  {} -> {} [{:?}, lag {}{}]  {}",
            idx + 1,
            e.source,
            e.target,
            e.mode,
            e.lag_months,
            threshold,
            e.description
        );
    }
}

fn cmd_batch(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut policy: Option<String> = None;
    let mut runs: Option<u32> = None;
    let mut months: Option<u32> = None;
    let mut seed: Option<u64> = None;
    let mut noise: Option<f64> = None;
    let mut modifiers_json: Option<String> = None;
    let mut json = false;
    let mut log_path: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"bs batch

USAGE:
    bs batch --policy NAME|random [OPTIONS]

OPTIONS:
    --config PATH       YAML config (default: built-in reference setup)
    --policy NAME       Catalog policy to play every month, or `random`
    --runs N            Number of runs (default: batch.runs)
    --months M          Months per run (default: batch.months)
    --seed S            Base seed; run i uses S + i (default: batch.seed or random)
    --modifiers JSON    External modifier record applied after every month
    --noise X           Relative modifier jitter (default: batch.modifier_noise)
    --json              Print the full report as JSON
    --log PATH          Append NDJSON events to PATH
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(flag_value(args, i));
                i += 2;
            }
            "--policy" => {
                policy = Some(flag_value(args, i));
                i += 2;
            }
            "--runs" => {
                runs = Some(flag_value(args, i));
                i += 2;
            }
            "--months" => {
                months = Some(flag_value(args, i));
                i += 2;
            }
            "--seed" => {
                seed = Some(flag_value(args, i));
                i += 2;
            }
            "--noise" => {
                noise = Some(flag_value(args, i));
                i += 2;
            }
            "--modifiers" => {
                modifiers_json = Some(flag_value(args, i));
                i += 2;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            "--log" => {
                log_path = Some(flag_value(args, i));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `bs batch`: {}", other);
                eprintln!("Run `bs batch --help` for usage.");
                process::exit(1);
            }
        }
    }

    let Some(policy) = policy else {
        fail("Missing --policy (a catalog name or `random`)");
    };
    let (cfg, config_hash) = load_config(config_path.as_deref());
    let engine = build_engine(&cfg);

    let mut opts = BatchOptions::from_config(&cfg.batch, rand::random());
    if let Some(n) = runs {
        opts.runs = n;
    }
    if let Some(m) = months {
        opts.months = m;
    }
    if let Some(s) = seed {
        opts.seed = s;
    }
    if let Some(x) = noise {
        opts.noise = x;
    }

    let modifiers = modifiers_json.map(|s| {
        let m: ExternalModifiers =
            serde_json::from_str(&s).unwrap_or_else(|e| fail(format!("Invalid --modifiers: {e}")));
        StaticModifiers(m)
    });
    let source = modifiers.as_ref().map(|m| m as &(dyn bs_core::ModifierSource + Sync));

    let plan = PolicyPlan::parse(&policy);
    let report = run_batch(&engine, &cfg.initial_state, &plan, source, &opts).unwrap_or_else(|e| fail(e));

    let mut log = open_log(log_path.as_deref());
    log_event(
        &mut log,
        &RunStartEventV1 {
            event: "run_start",
            ts_ms: now_ms(),
            schema_version: EVENT_SCHEMA_VERSION,
            command: "batch".to_string(),
            config_hash,
            git_hash: try_git_hash(),
            horizon_months: opts.months,
            policy_count: engine.legal_moves().len(),
            seed: opts.seed,
        },
    );
    log_event(
        &mut log,
        &BatchSummaryEventV1 {
            event: "batch_summary",
            ts_ms: now_ms(),
            schema_version: EVENT_SCHEMA_VERSION,
            policy: report.policy.clone(),
            runs: report.runs,
            months: report.months,
            seed: report.seed,
            survival_probability: report.survival_probability,
            p10: report.p10,
            p50: report.p50,
            p90: report.p90,
        },
    );

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => fail(e),
        }
        return;
    }

    println!("Batch: {} x {} months, policy {}, seed {}", report.runs, report.months, report.policy, report.seed);
    println!("  - Survival probability: {:.1}%", report.survival_probability * 100.0);
    println!(
        "  - Final cash: p10={:.0}, p50={:.0}, p90={:.0}",
        report.p10, report.p50, report.p90
    );
    println!("  - Monthly cash (p10 / p50 / p90):");
    for m in &report.series {
        println!("      {:>3}  {:>12.0} {:>12.0} {:>12.0}", m.month, m.p10, m.p50, m.p90);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        process::exit(0);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
        }
        "-V" | "--version" => {
            print_version();
        }
        "advise" => {
            cmd_advise(&args[2..]);
        }
        "moves" => {
            cmd_moves(&args[2..]);
        }
        "graph" => {
            cmd_graph(&args[2..]);
        }
        "batch" => {
            cmd_batch(&args[2..]);
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Run `bs --help` for usage.");
            process::exit(1);
        }
    }
}
