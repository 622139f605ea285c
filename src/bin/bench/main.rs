// Kelly Market Benchmark Runner v0.2.0: fairness, strategy and pricing experiments
// Monte Carlo (N=30), seedable ChaCha8 PRNG, per-snapshot audit trail
//
// Usage:
//   cargo run --release --bin bench                          # All experiments (30 runs each)
//   cargo run --release --bin bench -- --runs 5              # Quick mode (5 runs each)
//   cargo run --release --bin bench -- fairness              # Filter by name or category
//   cargo run --release --bin bench -- --time-series         # Enable JSONL output
//   cargo run --release --bin bench -- --seed 42             # Custom base seed
//   cargo run --release --bin bench -- --horizon 200         # Shorter runs
//   cargo run --release --bin bench -- --config market.json  # One custom scenario
//
// Set RUST_LOG=debug to see price adjustments and departures.

mod metrics;
mod monte_carlo;
mod report;
mod scenarios;
mod time_series;

use kelly_engine::MarketConfig;
use report::*;
use scenarios::*;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    horizon: Option<f64>,
    config: Option<String>,
    time_series: bool,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 30,
        seed: 0,
        horizon: None,
        config: None,
        time_series: false,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(30);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--horizon" => {
                i += 1;
                if i < args.len() {
                    cli.horizon = args[i].parse().ok();
                }
            }
            "--config" => {
                i += 1;
                if i < args.len() {
                    cli.config = Some(args[i].clone());
                }
            }
            "--time-series" => {
                cli.time_series = true;
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn load_config(path: &str) -> MarketConfig {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Failed to parse {}: {}", path, e))
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();
    let cli = parse_args();

    let all_scenarios = match &cli.config {
        Some(path) => {
            let mut config = load_config(path);
            if let Some(h) = cli.horizon {
                config.horizon = h;
            }
            vec![custom(config)]
        }
        None => {
            let mut base = MarketConfig::hybrid();
            if let Some(h) = cli.horizon {
                base.horizon = h;
            }
            scenarios(&base)
        }
    };

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    let ts_dir = if cli.time_series {
        let dir = std::path::Path::new("benchmark-results/time-series");
        Some(dir.to_path_buf())
    } else {
        None
    };

    println!("\n  Kelly Market Benchmark Runner v0.2.0");
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!("  {:<30} {:>5} {:>7} {:>14} {:>8} {:>7} {:>7} {:>7}",
        "Scenario", "Pass%", "Util", "Welfare", "Price", "Jain", "BidCV", "Time");
    println!("  {}", "-".repeat(94));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = monte_carlo::run_monte_carlo(
            scenario,
            cli.runs,
            cli.seed,
            ts_dir.as_deref(),
        );

        let pass_pct = report.pass_rate * 100.0;
        let welfare_ci = (report.avg_social_welfare.ci_upper - report.avg_social_welfare.ci_lower) / 2.0;
        let status = if report.pass_rate >= 1.0 { "PASS" } else { "FAIL" };

        println!("  {:<30} {:>4}% {:>7.3} {:>8.1}±{:<5.1} {:>8.3} {:>7.3} {:>7.3} {:>5.0}ms  {}",
            report.label,
            pass_pct as u32,
            report.avg_utilization.mean,
            report.avg_social_welfare.mean, welfare_ci,
            report.avg_price.mean,
            report.subject_fairness.mean,
            report.bid_volatility.mean,
            report.elapsed_ms.mean,
            status,
        );

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Paired Comparisons ─────────────────────────────────────────────

    let pairs = [
        ("FAIRNESS_ALPHA_1", "FAIRNESS_ALPHA_0"),
        ("FAIRNESS_ALPHA_1", "FAIRNESS_ALPHA_2"),
        ("STRATEGY_BEST_RESPONSE", "STRATEGY_GRADIENT"),
        ("PRICING_DYNAMIC", "PRICING_STATIC"),
    ];
    let find = |name: &str| mc_reports.iter().find(|r| r.scenario_name == name);
    let comparisons: Vec<ExperimentComparison> = pairs
        .iter()
        .filter_map(|(base, variant)| Some(metrics::compare(find(*base)?, find(*variant)?)))
        .collect();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= 1.0).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(94));
    println!("  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total, passed, failed, suite_elapsed.as_secs_f64());

    if !comparisons.is_empty() {
        println!("  Paired comparisons (variant - baseline):");
        for c in &comparisons {
            println!("    [{:<8}] {:<28} vs {:<28} welfare {:>+10.2}  jain {:>+7.3}  price {:>+8.3}",
                c.category, c.variant, c.baseline, c.welfare_delta, c.fairness_delta, c.price_delta);
        }
        println!();
    }

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        comparisons,
        scenarios: mc_reports,
    };

    let dir = std::path::Path::new("benchmark-results");
    if !dir.exists() {
        std::fs::create_dir_all(dir).expect("Failed to create benchmark-results/");
    }
    let path = dir.join(format!("bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report).expect("Failed to serialize");
    std::fs::write(&path, &json).expect("Failed to write benchmark file");
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
}
