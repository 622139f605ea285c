// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Statistics Accumulator
//
// Exact time-weighted integrals of market state. The engine calls
// `integrate` with the values that held over an interval *before* it
// mutates anything, so every integral is a sum of piecewise-constant
// rectangles.

use serde::{Deserialize, Serialize};

use crate::market_math::jain_index;
use crate::types::{DepartureRecord, SimTime};

// ─── Sample Statistics ──────────────────────────────────────────────────────

/// Plain (unweighted) statistics over a set of samples, with a 95%
/// normal-approximation confidence interval on the mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub mean: f64,
    /// Sample standard deviation (n-1 denominator); 0 for n <= 1.
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl SampleStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self::default();
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Instantaneous Metrics ──────────────────────────────────────────────────

/// Market state at one instant, as computed by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstantMetrics {
    pub player_count: usize,
    pub utilization: f64,
    pub avg_bid: f64,
    pub social_welfare: f64,
    /// Social welfare divided by the active player count.
    pub avg_satisfaction: f64,
    pub price: f64,
}

// ─── Time Series ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: SimTime,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSeries {
    pub player_count: Vec<SeriesPoint>,
    pub utilization: Vec<SeriesPoint>,
    pub avg_bid: Vec<SeriesPoint>,
    pub social_welfare: Vec<SeriesPoint>,
    pub avg_satisfaction: Vec<SeriesPoint>,
    pub price: Vec<SeriesPoint>,
}

impl MarketSeries {
    /// Number of snapshots taken (all six series have the same length).
    pub fn len(&self) -> usize {
        self.price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_empty()
    }

    fn push(&mut self, time: SimTime, m: &InstantMetrics) {
        let at = |value| SeriesPoint { time, value };
        self.player_count.push(at(m.player_count as f64));
        self.utilization.push(at(m.utilization));
        self.avg_bid.push(at(m.avg_bid));
        self.social_welfare.push(at(m.social_welfare));
        self.avg_satisfaction.push(at(m.avg_satisfaction));
        self.price.push(at(m.price));
    }
}

// ─── Summary ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub avg_player_count: f64,
    pub avg_utilization: f64,
    pub avg_bid: f64,
    pub avg_social_welfare: f64,
    pub avg_satisfaction: f64,
    pub avg_price: f64,
    /// Mean final utility of departed players.
    pub avg_utility_final: f64,
    pub std_dev_utility: f64,
    pub final_utility: SampleStats,
    /// Jain's index over departed players' average allocation shares.
    pub allocation_fairness: f64,
    pub departed_count: usize,
}

// ─── Accumulator ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Integrals {
    player_count: f64,
    utilization: f64,
    avg_bid: f64,
    social_welfare: f64,
    avg_satisfaction: f64,
    price: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsAccumulator {
    integrals: Integrals,
    integrated_time: f64,
    series: MarketSeries,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value * elapsed` to every integral. Non-positive `elapsed` is a no-op.
    pub fn integrate(&mut self, elapsed: f64, m: &InstantMetrics) {
        if elapsed <= 0.0 {
            return;
        }
        let i = &mut self.integrals;
        i.player_count += m.player_count as f64 * elapsed;
        i.utilization += m.utilization * elapsed;
        i.avg_bid += m.avg_bid * elapsed;
        i.social_welfare += m.social_welfare * elapsed;
        i.avg_satisfaction += m.avg_satisfaction * elapsed;
        i.price += m.price * elapsed;
        self.integrated_time += elapsed;
    }

    pub fn snapshot(&mut self, time: SimTime, m: &InstantMetrics) {
        self.series.push(time, m);
    }

    /// Total time covered by `integrate` calls.
    pub fn integrated_time(&self) -> f64 {
        self.integrated_time
    }

    pub fn series(&self) -> &MarketSeries {
        &self.series
    }

    pub fn into_series(self) -> MarketSeries {
        self.series
    }

    pub fn summary(&self, total_time: f64, departed: &[DepartureRecord]) -> SummaryStats {
        let avg = |integral: f64| {
            if total_time > 0.0 {
                integral / total_time
            } else {
                0.0
            }
        };

        let utilities: Vec<f64> = departed.iter().map(|d| d.final_utility).collect();
        let allocations: Vec<f64> = departed.iter().map(|d| d.avg_allocation).collect();
        let final_utility = SampleStats::from_samples(&utilities);
        let i = &self.integrals;

        SummaryStats {
            avg_player_count: avg(i.player_count),
            avg_utilization: avg(i.utilization),
            avg_bid: avg(i.avg_bid),
            avg_social_welfare: avg(i.social_welfare),
            avg_satisfaction: avg(i.avg_satisfaction),
            avg_price: avg(i.price),
            avg_utility_final: final_utility.mean,
            std_dev_utility: final_utility.std_dev,
            final_utility,
            allocation_fairness: jain_index(&allocations),
            departed_count: departed.len(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(count: usize, price: f64) -> InstantMetrics {
        InstantMetrics {
            player_count: count,
            utilization: 0.5,
            avg_bid: 2.0,
            social_welfare: -1.0,
            avg_satisfaction: -0.5,
            price,
        }
    }

    fn departed(final_utility: f64, avg_allocation: f64) -> DepartureRecord {
        DepartureRecord {
            id: 0,
            label: None,
            permanent: false,
            valuation: 100.0,
            arrival_time: 0.0,
            departure_time: 1.0,
            time_in_system: 1.0,
            total_cost: 0.0,
            avg_allocation,
            final_bid: 1.0,
            final_utility,
            forced: false,
            history: Vec::new(),
        }
    }

    #[test]
    fn time_weighted_player_count() {
        let mut acc = StatisticsAccumulator::new();
        acc.integrate(10.0, &metrics(3, 1.0));
        acc.integrate(10.0, &metrics(0, 1.0));
        let s = acc.summary(20.0, &[]);
        assert!((s.avg_player_count - 1.5).abs() < 1e-12);
        assert!((acc.integrated_time() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn price_is_time_weighted() {
        let mut acc = StatisticsAccumulator::new();
        acc.integrate(1.0, &metrics(1, 4.0));
        acc.integrate(3.0, &metrics(1, 0.0));
        let s = acc.summary(4.0, &[]);
        assert!((s.avg_price - 1.0).abs() < 1e-12);
        assert!((s.avg_utilization - 0.5).abs() < 1e-12);
    }

    #[test]
    fn non_positive_elapsed_is_ignored() {
        let mut acc = StatisticsAccumulator::new();
        acc.integrate(0.0, &metrics(5, 1.0));
        acc.integrate(-2.0, &metrics(5, 1.0));
        assert_eq!(acc.integrated_time(), 0.0);
        assert_eq!(acc.summary(1.0, &[]).avg_player_count, 0.0);
    }

    #[test]
    fn zero_total_time_yields_zeros() {
        let mut acc = StatisticsAccumulator::new();
        acc.integrate(2.0, &metrics(5, 1.0));
        let s = acc.summary(0.0, &[]);
        assert_eq!(s.avg_player_count, 0.0);
        assert_eq!(s.avg_price, 0.0);
    }

    #[test]
    fn snapshot_appends_to_all_series() {
        let mut acc = StatisticsAccumulator::new();
        acc.snapshot(0.5, &metrics(2, 1.5));
        acc.snapshot(1.0, &metrics(3, 1.6));
        let series = acc.series();
        assert_eq!(series.len(), 2);
        assert_eq!(series.player_count.len(), 2);
        assert_eq!(series.social_welfare.len(), 2);
        assert_eq!(series.player_count[1].value, 3.0);
        assert_eq!(series.price[0], SeriesPoint { time: 0.5, value: 1.5 });
    }

    #[test]
    fn final_utility_mean_and_sample_std() {
        let acc = StatisticsAccumulator::new();
        let records = vec![departed(1.0, 0.2), departed(3.0, 0.2)];
        let s = acc.summary(10.0, &records);
        assert!((s.avg_utility_final - 2.0).abs() < 1e-12);
        // sqrt(((1-2)^2 + (3-2)^2) / 1)
        assert!((s.std_dev_utility - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((s.allocation_fairness - 1.0).abs() < 1e-12);
        assert_eq!(s.departed_count, 2);
    }

    #[test]
    fn single_departure_has_zero_std() {
        let acc = StatisticsAccumulator::new();
        let s = acc.summary(10.0, &[departed(7.0, 0.1)]);
        assert_eq!(s.avg_utility_final, 7.0);
        assert_eq!(s.std_dev_utility, 0.0);
    }

    #[test]
    fn sample_stats_interval_brackets_mean() {
        let stats = SampleStats::from_samples(&[2.0, 4.0, 6.0, 8.0]);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!(stats.ci_lower < stats.mean && stats.mean < stats.ci_upper);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.n, 4);
        assert_eq!(SampleStats::from_samples(&[]), SampleStats::default());
    }
}
