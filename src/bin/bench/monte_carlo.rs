// Monte Carlo Infrastructure: N runs per scenario with statistical aggregation
// Each scenario runs N times with seeds base..base+N-1, computing mean ± 95% CI

use kelly_engine::*;
use log::{debug, warn};

use crate::metrics;
use crate::report::*;
use crate::scenarios::Scenario;
use crate::time_series::TimeSeriesRecorder;

use std::time::Instant;

/// Run a single scenario iteration with a specific seed.
pub fn run_single(
    scenario: &Scenario,
    seed: u64,
    time_series_dir: Option<&std::path::Path>,
) -> BenchResult {
    let config = MarketConfig {
        seed,
        ..scenario.config.clone()
    };

    let start = Instant::now();
    let outcome = run(&config);
    let elapsed = start.elapsed();
    let elapsed_secs = elapsed.as_secs_f64().max(0.001);

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            warn!("{} seed {} failed: {}", scenario.name, seed, err);
            return failed_result(scenario, seed, err.to_string(), elapsed.as_millis());
        }
    };

    // Write time series if enabled
    if let Some(dir) = time_series_dir {
        let recorder = TimeSeriesRecorder::from_series(&result.series);
        let path = dir.join(format!("seed-{}.jsonl", seed));
        match recorder.write_jsonl(&path) {
            Ok(()) => debug!("wrote {} snapshots to {}", recorder.len(), path.display()),
            Err(e) => eprintln!("  Warning: failed to write time series: {}", e),
        }
    }

    let subjects = metrics::subject_outcomes(&result);
    let max_utilization = metrics::max_utilization(&result.series);
    let price_within_bounds = metrics::price_within_bounds(
        &result.series,
        config.pricing.min_price,
        config.pricing.max_price,
    );

    let c = &result.counters;
    let s = &result.summary;
    let pass = c.conservation_violations <= scenario.criteria.max_conservation_violations
        && max_utilization < scenario.criteria.max_utilization
        && price_within_bounds;

    BenchResult {
        scenario: scenario.label.clone(),
        name: scenario.name.to_string(),
        category: scenario.category.to_string(),
        seed,
        pass,
        error: None,
        events_dispatched: c.events_dispatched,
        stale_events: c.stale_events,
        arrivals: c.arrivals,
        departures: c.departures,
        conservation_violations: c.conservation_violations,
        avg_player_count: s.avg_player_count,
        avg_utilization: s.avg_utilization,
        max_utilization,
        avg_bid: s.avg_bid,
        avg_social_welfare: s.avg_social_welfare,
        avg_satisfaction: s.avg_satisfaction,
        avg_price: s.avg_price,
        final_price: result.final_price,
        price_within_bounds,
        avg_utility_final: s.avg_utility_final,
        std_dev_utility: s.std_dev_utility,
        allocation_fairness: s.allocation_fairness,
        subject_fairness: metrics::subject_fairness(&subjects),
        bid_volatility: metrics::bid_volatility(&result),
        subjects,
        elapsed_ms: elapsed.as_millis(),
        events_per_sec: c.events_dispatched as f64 / elapsed_secs,
    }
}

fn failed_result(scenario: &Scenario, seed: u64, error: String, elapsed_ms: u128) -> BenchResult {
    BenchResult {
        scenario: scenario.label.clone(),
        name: scenario.name.to_string(),
        category: scenario.category.to_string(),
        seed,
        pass: false,
        error: Some(error),
        events_dispatched: 0,
        stale_events: 0,
        arrivals: 0,
        departures: 0,
        conservation_violations: 0,
        avg_player_count: 0.0,
        avg_utilization: 0.0,
        max_utilization: 0.0,
        avg_bid: 0.0,
        avg_social_welfare: 0.0,
        avg_satisfaction: 0.0,
        avg_price: 0.0,
        final_price: 0.0,
        price_within_bounds: false,
        avg_utility_final: 0.0,
        std_dev_utility: 0.0,
        allocation_fairness: 0.0,
        subject_fairness: 0.0,
        bid_volatility: 0.0,
        subjects: Vec::new(),
        elapsed_ms,
        events_per_sec: 0.0,
    }
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats.
pub fn run_monte_carlo(
    scenario: &Scenario,
    n_runs: usize,
    base_seed: u64,
    time_series_base: Option<&std::path::Path>,
) -> MonteCarloReport {
    let ts_dir = time_series_base.map(|base| base.join(scenario.name.to_lowercase()));

    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        let seed = base_seed + i as u64;
        let result = run_single(scenario, seed, ts_dir.as_deref());
        results.push(result);
    }

    aggregate(scenario, results)
}

/// Aggregate individual runs into a MonteCarloReport.
fn aggregate(scenario: &Scenario, results: Vec<BenchResult>) -> MonteCarloReport {
    let n = results.len();
    let passed = results.iter().filter(|r| r.pass).count();
    let pass_rate = if n > 0 { passed as f64 / n as f64 } else { 0.0 };

    let stat = |f: fn(&BenchResult) -> f64| {
        Stats::from_samples(&results.iter().map(f).collect::<Vec<_>>())
    };

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.clone(),
        category: scenario.category.to_string(),
        n_runs: n,
        pass_rate,
        avg_player_count: stat(|r| r.avg_player_count),
        avg_utilization: stat(|r| r.avg_utilization),
        avg_social_welfare: stat(|r| r.avg_social_welfare),
        avg_satisfaction: stat(|r| r.avg_satisfaction),
        avg_price: stat(|r| r.avg_price),
        avg_utility_final: stat(|r| r.avg_utility_final),
        allocation_fairness: stat(|r| r.allocation_fairness),
        subject_fairness: stat(|r| r.subject_fairness),
        bid_volatility: stat(|r| r.bid_volatility),
        elapsed_ms: stat(|r| r.elapsed_ms as f64),
        events_per_sec: stat(|r| r.events_per_sec),
        individual_runs: results,
    }
}
