// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Type Definitions

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::scheduler::EventKind;
use crate::statistics::{MarketSeries, SummaryStats};

pub type PlayerId = u64;

/// Logical simulation time.
pub type SimTime = f64;

// ─── History ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub time: SimTime,
    pub bid: f64,
    pub allocation: f64,
}

/// Sampling rules for per-player history.
#[derive(Debug, Clone, Copy)]
pub struct HistoryPolicy {
    /// 0 disables history.
    pub capacity: usize,
    /// Minimum spacing between background-player samples.
    pub min_interval: f64,
}

// ─── Player ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub label: Option<String>,
    /// Valuation `a`; fixed for the player's lifetime.
    pub valuation: f64,
    pub bid: f64,
    pub arrival_time: SimTime,
    /// Integral of `bid * price` over the player's active time.
    pub cost_integral: f64,
    /// Integral of the allocation share over the player's active time.
    pub allocation_integral: f64,
    pub last_update: SimTime,
    pub permanent: bool,
    pub history: VecDeque<HistorySample>,
    #[serde(default)]
    last_sample_time: Option<SimTime>,
}

impl Player {
    pub fn background(id: PlayerId, valuation: f64, bid: f64, now: SimTime) -> Self {
        Self {
            id,
            label: None,
            valuation,
            bid,
            arrival_time: now,
            cost_integral: 0.0,
            allocation_integral: 0.0,
            last_update: now,
            permanent: false,
            history: VecDeque::new(),
            last_sample_time: None,
        }
    }

    pub fn permanent(id: PlayerId, label: String, valuation: f64, bid: f64, now: SimTime) -> Self {
        Self {
            label: Some(label),
            permanent: true,
            ..Self::background(id, valuation, bid, now)
        }
    }

    /// Charge the interval `[last_update, now]` at the given allocation and
    /// price, then record a history sample if the policy allows one.
    pub fn accrue(&mut self, now: SimTime, allocation: f64, price: f64, policy: HistoryPolicy) {
        let dt = now - self.last_update;
        if dt > 0.0 {
            self.cost_integral += self.bid * price * dt;
            self.allocation_integral += allocation * dt;
        }
        self.last_update = self.last_update.max(now);
        self.record(now, allocation, policy);
    }

    fn record(&mut self, now: SimTime, allocation: f64, policy: HistoryPolicy) {
        if policy.capacity == 0 {
            return;
        }
        let due = self.permanent
            || self
                .last_sample_time
                .map_or(true, |last| now - last > policy.min_interval);
        if !due {
            return;
        }
        if self.history.len() == policy.capacity {
            self.history.pop_front();
        }
        self.history.push_back(HistorySample {
            time: now,
            bid: self.bid,
            allocation,
        });
        self.last_sample_time = Some(now);
    }

    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("player-{}", self.id),
        }
    }
}

// ─── Departure Record ───────────────────────────────────────────────────────

/// Archived outcome of a player that left the market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartureRecord {
    pub id: PlayerId,
    pub label: Option<String>,
    pub permanent: bool,
    pub valuation: f64,
    pub arrival_time: SimTime,
    pub departure_time: SimTime,
    pub time_in_system: f64,
    pub total_cost: f64,
    /// Time-averaged allocation share in `[0, 1]`.
    pub avg_allocation: f64,
    pub final_bid: f64,
    pub final_utility: f64,
    /// Forced out at the end of the run rather than by its own sojourn.
    pub forced: bool,
    pub history: Vec<HistorySample>,
}

// ─── Run Phase ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Initialized,
    Running,
    Finalizing,
    Complete,
}

// ─── Dispatch Record ────────────────────────────────────────────────────────

/// One dispatched event as seen from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub time: SimTime,
    pub sequence: u64,
    pub kind: EventKind,
    /// `false` for stale events that were ignored.
    pub applied: bool,
}

// ─── Run Result ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounters {
    pub events_dispatched: u64,
    pub stale_events: u64,
    pub arrivals: u64,
    pub departures: u64,
    pub price_adjustments: u64,
    pub bid_revisions: u64,
    pub conservation_violations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub label: String,
    pub alpha: u32,
    pub seed: u64,
    pub series: MarketSeries,
    pub departed: Vec<DepartureRecord>,
    pub summary: SummaryStats,
    pub counters: RunCounters,
    pub final_price: f64,
    pub final_time: SimTime,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: HistoryPolicy = HistoryPolicy {
        capacity: 3,
        min_interval: 1.0,
    };

    #[test]
    fn accrue_integrates_cost_and_allocation() {
        let mut p = Player::background(1, 100.0, 2.0, 0.0);
        p.accrue(4.0, 0.25, 0.5, POLICY);
        assert!((p.cost_integral - 4.0).abs() < 1e-12);
        assert!((p.allocation_integral - 1.0).abs() < 1e-12);
        assert_eq!(p.last_update, 4.0);
    }

    #[test]
    fn background_history_is_thinned() {
        let mut p = Player::background(1, 100.0, 1.0, 0.0);
        // Exactly one interval apart is not yet due.
        for t in [0.0, 0.3, 0.6, 1.0, 1.5, 2.2] {
            p.accrue(t, 0.1, 1.0, POLICY);
        }
        let times: Vec<f64> = p.history.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.5]);
    }

    #[test]
    fn permanent_history_drops_oldest() {
        let mut p = Player::permanent(0, "Avg 1".into(), 80.0, 0.1, 0.0);
        for t in [0.1, 0.2, 0.3, 0.4] {
            p.accrue(t, 0.1, 1.0, POLICY);
        }
        let times: Vec<f64> = p.history.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.2, 0.3, 0.4]);
        assert_eq!(p.display_name(), "Avg 1");
    }

    #[test]
    fn zero_capacity_disables_history() {
        let mut p = Player::permanent(0, "x".into(), 1.0, 0.1, 0.0);
        p.accrue(1.0, 0.5, 1.0, HistoryPolicy { capacity: 0, min_interval: 1.0 });
        assert!(p.history.is_empty());
    }
}
