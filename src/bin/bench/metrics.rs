// Per-Run Metric Extraction: test subjects, bid stability, invariant checks
// Everything here reads a finished RunResult; nothing drives the engine

use kelly_engine::market_math::jain_index;
use kelly_engine::{DepartureRecord, MarketSeries, RunResult};
use serde::Serialize;

use crate::report::{ExperimentComparison, MonteCarloReport};

/// Fraction of each history ignored as warm-up when measuring bid stability.
const WARMUP_FRACTION: f64 = 0.2;

// ─── Test Subjects ──────────────────────────────────────────────────────────

/// Outcome of one permanent player, forced out at the horizon.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectOutcome {
    pub label: String,
    pub valuation: f64,
    pub avg_allocation_pct: f64,
    pub final_bid: f64,
    pub final_utility: f64,
    pub total_cost: f64,
}

impl SubjectOutcome {
    fn from_record(d: &DepartureRecord) -> Self {
        Self {
            label: d.label.clone().unwrap_or_else(|| format!("player-{}", d.id)),
            valuation: d.valuation,
            avg_allocation_pct: d.avg_allocation * 100.0,
            final_bid: d.final_bid,
            final_utility: d.final_utility,
            total_cost: d.total_cost,
        }
    }
}

pub fn subject_outcomes(result: &RunResult) -> Vec<SubjectOutcome> {
    let mut out: Vec<SubjectOutcome> = result
        .departed
        .iter()
        .filter(|d| d.permanent)
        .map(SubjectOutcome::from_record)
        .collect();
    out.sort_by(|a, b| a.valuation.total_cmp(&b.valuation));
    out
}

/// Jain's index over the test subjects' average allocations.
pub fn subject_fairness(subjects: &[SubjectOutcome]) -> f64 {
    let shares: Vec<f64> = subjects.iter().map(|s| s.avg_allocation_pct).collect();
    jain_index(&shares)
}

// ─── Bid Stability ──────────────────────────────────────────────────────────

/// Mean coefficient of variation of each test subject's bid after warm-up.
/// Near zero means bids settled; large values mean oscillation.
pub fn bid_volatility(result: &RunResult) -> f64 {
    let per_player: Vec<f64> = result
        .departed
        .iter()
        .filter(|d| d.permanent)
        .filter_map(|d| {
            let skip = (d.history.len() as f64 * WARMUP_FRACTION) as usize;
            let bids: Vec<f64> = d.history.iter().skip(skip).map(|h| h.bid).collect();
            coefficient_of_variation(&bids)
        })
        .collect();

    if per_player.is_empty() {
        return 0.0;
    }
    per_player.iter().sum::<f64>() / per_player.len() as f64
}

fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt() / mean)
}

// ─── Invariant Checks ───────────────────────────────────────────────────────

pub fn max_utilization(series: &MarketSeries) -> f64 {
    series
        .utilization
        .iter()
        .map(|p| p.value)
        .fold(0.0_f64, f64::max)
}

pub fn price_within_bounds(series: &MarketSeries, min: f64, max: f64) -> bool {
    series.price.iter().all(|p| p.value >= min && p.value <= max)
}

// ─── Paired Comparison ──────────────────────────────────────────────────────

/// Mean differences `variant - baseline` for two scenarios of one experiment.
pub fn compare(baseline: &MonteCarloReport, variant: &MonteCarloReport) -> ExperimentComparison {
    ExperimentComparison {
        category: baseline.category.clone(),
        baseline: baseline.label.clone(),
        variant: variant.label.clone(),
        welfare_delta: variant.avg_social_welfare.mean - baseline.avg_social_welfare.mean,
        fairness_delta: variant.subject_fairness.mean - baseline.subject_fairness.mean,
        price_delta: variant.avg_price.mean - baseline.avg_price.mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kelly_engine::statistics::SeriesPoint;

    #[test]
    fn cv_of_constant_is_zero() {
        assert_eq!(coefficient_of_variation(&[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[2.0]), None);
    }

    #[test]
    fn bounds_check_reads_every_point() {
        let mut series = MarketSeries::default();
        series.price = vec![
            SeriesPoint { time: 0.0, value: 1.0 },
            SeriesPoint { time: 1.0, value: 60.0 },
        ];
        assert!(!price_within_bounds(&series, 0.05, 50.0));
        assert!(price_within_bounds(&series, 0.05, 100.0));
    }
}
