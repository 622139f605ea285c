// Benchmark Report Types
// Structured output for independent analysis of the market experiments

use serde::Serialize;

pub use kelly_engine::SampleStats as Stats;

use crate::metrics::SubjectOutcome;

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub scenario: String,
    pub name: String,
    pub category: String,
    pub seed: u64,
    pub pass: bool,
    pub error: Option<String>,
    pub events_dispatched: u64,
    pub stale_events: u64,
    pub arrivals: u64,
    pub departures: u64,
    pub conservation_violations: u64,
    pub avg_player_count: f64,
    pub avg_utilization: f64,
    pub max_utilization: f64,
    pub avg_bid: f64,
    pub avg_social_welfare: f64,
    pub avg_satisfaction: f64,
    pub avg_price: f64,
    pub final_price: f64,
    pub price_within_bounds: bool,
    pub avg_utility_final: f64,
    pub std_dev_utility: f64,
    pub allocation_fairness: f64,
    pub subject_fairness: f64,
    pub bid_volatility: f64,
    pub subjects: Vec<SubjectOutcome>,
    pub elapsed_ms: u128,
    pub events_per_sec: f64,
}

// ─── Monte Carlo Report (per-scenario aggregation) ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub scenario_name: String,
    pub label: String,
    pub category: String,
    pub n_runs: usize,
    pub pass_rate: f64,
    pub avg_player_count: Stats,
    pub avg_utilization: Stats,
    pub avg_social_welfare: Stats,
    pub avg_satisfaction: Stats,
    pub avg_price: Stats,
    pub avg_utility_final: Stats,
    pub allocation_fairness: Stats,
    pub subject_fairness: Stats,
    pub bid_volatility: Stats,
    pub elapsed_ms: Stats,
    pub events_per_sec: Stats,
    pub individual_runs: Vec<BenchResult>,
}

// ─── Experiment Comparison ──────────────────────────────────────────────────

/// Paired difference between two scenarios of the same experiment.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentComparison {
    pub category: String,
    pub baseline: String,
    pub variant: String,
    pub welfare_delta: f64,
    pub fairness_delta: f64,
    pub price_delta: f64,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub summary: Summary,
    pub comparisons: Vec<ExperimentComparison>,
    pub scenarios: Vec<MonteCarloReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}
