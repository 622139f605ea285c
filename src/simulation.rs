// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Simulation Core
//
// Single-threaded discrete-event engine. Each dispatch:
//
//   1. pops the earliest (time, sequence) event,
//   2. integrates every time-weighted quantity over [clock, event.time]
//      using the state that held during that interval,
//   3. advances the clock,
//   4. runs the handler, which may mutate state and schedule more events,
//   5. snapshots the time series if the handler changed anything.
//
// All random draws come from one seeded ChaCha8 stream in dispatch order,
// so a run is fully determined by its configuration.

use std::collections::BTreeMap;

use log::{debug, error, info, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use wasm_bindgen::prelude::*;

use crate::config::{BidStrategy, MarketConfig};
use crate::conservation::PopulationLedger;
use crate::error::Result;
use crate::governor::PriceGovernor;
use crate::market_math;
use crate::scheduler::{EventKind, EventScheduler};
use crate::statistics::{InstantMetrics, StatisticsAccumulator};
use crate::types::*;

// ─── MarketSimulation struct ─────────────────────────────────────────────────

#[wasm_bindgen]
pub struct MarketSimulation {
    pub(crate) config: MarketConfig,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) scheduler: EventScheduler,
    pub(crate) clock: SimTime,
    pub(crate) phase: RunPhase,

    // Ordered by id so broadcasts and sums iterate deterministically.
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) departed: Vec<DepartureRecord>,
    pub(crate) permanent_ids: Vec<PlayerId>,
    pub(crate) next_player_id: PlayerId,

    pub(crate) governor: PriceGovernor,
    pub(crate) stats: StatisticsAccumulator,
    pub(crate) ledger: PopulationLedger,
    pub(crate) counters: RunCounters,
    pub(crate) history: HistoryPolicy,
}

// ─── Construction ────────────────────────────────────────────────────────────

impl MarketSimulation {
    /// Validate `config`, seed the permanent players and queue the opening
    /// events. Nothing is dispatched until [`step`](Self::step) or
    /// [`run`](Self::run).
    pub fn new(config: MarketConfig) -> Result<Self> {
        config.validate()?;

        let next_player_id = config
            .permanent_players
            .iter()
            .map(|p| p.id + 1)
            .max()
            .unwrap_or(0);

        let mut sim = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            scheduler: EventScheduler::new(),
            clock: 0.0,
            phase: RunPhase::Initialized,
            players: BTreeMap::new(),
            departed: Vec::new(),
            permanent_ids: Vec::new(),
            next_player_id,
            governor: PriceGovernor::new(&config.pricing),
            stats: StatisticsAccumulator::new(),
            ledger: PopulationLedger::new(),
            counters: RunCounters::default(),
            history: HistoryPolicy {
                capacity: config.history_capacity,
                min_interval: config.history_min_interval,
            },
            config,
        };
        sim.bootstrap();
        Ok(sim)
    }

    fn bootstrap(&mut self) {
        let opening_bid = self.config.seed_bid.max(self.config.epsilon);
        let specs = self.config.permanent_players.clone();
        for spec in specs {
            let player = Player::permanent(spec.id, spec.label, spec.valuation, opening_bid, 0.0);
            self.players.insert(spec.id, player);
            self.permanent_ids.push(spec.id);
            self.ledger.record_created();
            self.counters.arrivals += 1;
        }
        if !self.players.is_empty() {
            self.notify_all();
            self.verify_population();
        }

        if self.config.background_players {
            self.schedule(0.0, EventKind::PlayerArrival);
        }
        if self.config.pricing.enabled && self.config.pricing.interval < self.config.horizon {
            self.schedule(self.config.pricing.interval, EventKind::PriceAdjustment);
        }

        self.snapshot();
    }
}

// ─── Dispatch Loop ───────────────────────────────────────────────────────────

impl MarketSimulation {
    /// Dispatch exactly one event.
    ///
    /// Returns `Ok(None)` once the queue is empty or the next event lies
    /// beyond the horizon; the run then still needs [`run`](Self::run) or
    /// [`finish`](Self::finish) to finalize.
    pub fn step(&mut self) -> Result<Option<DispatchRecord>> {
        if self.phase == RunPhase::Complete {
            return Ok(None);
        }
        match self.scheduler.peek_time() {
            Some(t) if t <= self.config.horizon => {}
            _ => return Ok(None),
        }
        let Some(event) = self.scheduler.pop_next() else {
            return Ok(None);
        };

        if self.phase == RunPhase::Initialized {
            self.phase = RunPhase::Running;
            info!(
                "market run started: {} (seed {}, horizon {})",
                self.config.label, self.config.seed, self.config.horizon
            );
        }

        self.advance_clock(event.time());

        let applied = match event.kind {
            EventKind::PlayerArrival => self.handle_arrival(),
            EventKind::PlayerDeparture { player, forced } => self.handle_departure(player, forced),
            EventKind::BidRevision { player } => self.handle_bid_revision(player)?,
            EventKind::PriceAdjustment => self.handle_price_adjustment(),
        };

        self.counters.events_dispatched += 1;
        if applied {
            self.snapshot();
            trace!(
                "t={:.4} seq={} {} applied",
                event.time(),
                event.sequence(),
                event.kind.label()
            );
        } else {
            self.counters.stale_events += 1;
            trace!(
                "t={:.4} seq={} {} stale (player {:?})",
                event.time(),
                event.sequence(),
                event.kind.label(),
                event.kind.player()
            );
        }

        Ok(Some(DispatchRecord {
            time: event.time(),
            sequence: event.sequence(),
            kind: event.kind,
            applied,
        }))
    }

    /// Dispatch until the horizon, then finalize.
    pub fn run(&mut self) -> Result<()> {
        while self.step()?.is_some() {}
        self.finalize();
        Ok(())
    }

    /// Run to completion and hand back the results.
    pub fn finish(mut self) -> Result<RunResult> {
        self.run()?;
        Ok(self.collect_result())
    }

    fn finalize(&mut self) {
        if self.phase == RunPhase::Complete {
            return;
        }
        self.phase = RunPhase::Finalizing;

        let horizon = self.config.horizon;
        self.advance_clock(horizon);
        self.scheduler.advance_to(horizon);

        let permanent = self.permanent_ids.clone();
        for id in permanent {
            self.handle_departure(id, true);
        }
        self.snapshot();
        self.phase = RunPhase::Complete;

        info!(
            "market run finished: {} at t={} ({} events, {} stale, {} arrivals, {} departures, price {:.4})",
            self.config.label,
            self.clock,
            self.counters.events_dispatched,
            self.counters.stale_events,
            self.counters.arrivals,
            self.counters.departures,
            self.governor.price()
        );
    }

    fn collect_result(&mut self) -> RunResult {
        let summary = self.stats.summary(self.clock, &self.departed);
        RunResult {
            label: self.config.label.clone(),
            alpha: self.config.alpha,
            seed: self.config.seed,
            series: std::mem::take(&mut self.stats).into_series(),
            departed: std::mem::take(&mut self.departed),
            summary,
            counters: self.counters.clone(),
            final_price: self.governor.price(),
            final_time: self.clock,
        }
    }
}

/// Validate, run and summarize one market.
pub fn run(config: &MarketConfig) -> Result<RunResult> {
    MarketSimulation::new(config.clone())?.finish()
}

// ─── Handlers ────────────────────────────────────────────────────────────────

impl MarketSimulation {
    fn handle_arrival(&mut self) -> bool {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let valuation = self.uniform(self.config.valuation_min, self.config.valuation_max);
        let player = Player::background(id, valuation, self.config.epsilon, self.clock);
        self.players.insert(id, player);
        self.ledger.record_created();
        self.counters.arrivals += 1;

        let sojourn = self.exponential(1.0 / self.config.mean_sojourn);
        self.schedule(
            self.clock + sojourn,
            EventKind::PlayerDeparture { player: id, forced: false },
        );

        let next_arrival = self.clock + self.exponential(self.config.arrival_rate);
        if next_arrival < self.config.horizon {
            self.schedule(next_arrival, EventKind::PlayerArrival);
        }

        self.notify_all();
        self.verify_population();
        true
    }

    fn handle_departure(&mut self, id: PlayerId, forced: bool) -> bool {
        match self.players.get(&id) {
            None => return false,
            Some(p) if p.permanent && !forced => return false,
            Some(_) => {}
        }

        let total = self.total_bid();
        let Some(player) = self.players.remove(&id) else {
            return false;
        };

        let price = self.governor.price();
        let allocation = market_math::allocation_share(player.bid, total, self.config.delta);
        let final_utility = self.player_utility(&player, allocation, price);
        let time_in_system = self.clock - player.arrival_time;
        let avg_allocation = if time_in_system > 0.0 {
            player.allocation_integral / time_in_system
        } else {
            0.0
        };

        debug!(
            "t={:.4} {} departed{} after {:.3} (bid {:.4}, utility {:.4})",
            self.clock,
            player.display_name(),
            if forced { " (forced)" } else { "" },
            time_in_system,
            player.bid,
            final_utility
        );

        self.departed.push(DepartureRecord {
            id,
            label: player.label,
            permanent: player.permanent,
            valuation: player.valuation,
            arrival_time: player.arrival_time,
            departure_time: self.clock,
            time_in_system,
            total_cost: player.cost_integral,
            avg_allocation,
            final_bid: player.bid,
            final_utility,
            forced,
            history: player.history.into_iter().collect(),
        });
        self.counters.departures += 1;

        self.notify_all();
        self.verify_population();
        true
    }

    fn handle_bid_revision(&mut self, id: PlayerId) -> Result<bool> {
        let total = self.total_bid();
        let price = self.governor.price();
        let cfg = &self.config;

        let Some(player) = self.players.get(&id) else {
            return Ok(false);
        };

        let s_minus = (total - player.bid + cfg.delta).max(cfg.delta);
        let proposed = match cfg.strategy {
            BidStrategy::BestResponse => market_math::best_response(
                player.valuation,
                s_minus,
                price,
                cfg.alpha,
                cfg.epsilon,
            )?,
            BidStrategy::GradientAscent { step_size } => market_math::gradient_step_bid(
                player.bid,
                player.valuation,
                s_minus,
                price,
                cfg.alpha,
                step_size,
                cfg.budget,
                cfg.epsilon,
            ),
        };
        let ceiling = cfg.budget / price.max(cfg.epsilon);
        let bid = proposed.min(ceiling).max(cfg.epsilon);

        if let Some(player) = self.players.get_mut(&id) {
            player.bid = bid;
        }
        self.counters.bid_revisions += 1;
        Ok(true)
    }

    fn handle_price_adjustment(&mut self) -> bool {
        let utilization = market_math::utilization(self.total_bid(), self.config.delta);
        let adj = self.governor.adjust(utilization);
        self.counters.price_adjustments += 1;

        debug!(
            "t={:.4} price {:.4} -> {:.4} (utilization {:.4}, {}{})",
            self.clock,
            adj.previous_price,
            adj.price,
            adj.utilization,
            adj.pressure.label(),
            if adj.clamped { ", clamped" } else { "" }
        );

        self.notify_all();

        let next = self.clock + self.config.pricing.interval;
        if next < self.config.horizon {
            self.schedule(next, EventKind::PriceAdjustment);
        }
        true
    }

    /// Ask every active player to revise after its own thinking delay.
    fn notify_all(&mut self) {
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for player in ids {
            let delay = self.uniform(self.config.revision_delay_min, self.config.revision_delay_max);
            let at = self.clock + delay;
            if at < self.config.horizon {
                self.schedule(at, EventKind::BidRevision { player });
            }
        }
    }
}

// ─── State Accounting ────────────────────────────────────────────────────────

impl MarketSimulation {
    fn total_bid(&self) -> f64 {
        self.players.values().map(|p| p.bid).sum()
    }

    /// Payoff of one player; bids under the floor count as zero.
    fn player_utility(&self, player: &Player, allocation: f64, price: f64) -> f64 {
        if player.bid < self.config.epsilon {
            return 0.0;
        }
        market_math::utility(player.valuation, allocation, price, player.bid, self.config.alpha)
    }

    /// Current market state as seen by the statistics accumulator.
    pub fn instant_metrics(&self) -> InstantMetrics {
        let count = self.players.len();
        let total = self.total_bid();
        let price = self.governor.price();

        let social_welfare: f64 = self
            .players
            .values()
            .map(|p| {
                let allocation = market_math::allocation_share(p.bid, total, self.config.delta);
                self.player_utility(p, allocation, price)
            })
            .sum();

        let (avg_bid, avg_satisfaction) = if count > 0 {
            (total / count as f64, social_welfare / count as f64)
        } else {
            (0.0, 0.0)
        };

        InstantMetrics {
            player_count: count,
            utilization: market_math::utilization(total, self.config.delta),
            avg_bid,
            social_welfare,
            avg_satisfaction,
            price,
        }
    }

    /// Integrate `[clock, to]` with the state that held over it, then move
    /// the clock.
    fn advance_clock(&mut self, to: SimTime) {
        let elapsed = to - self.clock;
        if elapsed > 0.0 {
            let metrics = self.instant_metrics();
            self.stats.integrate(elapsed, &metrics);

            let total = self.total_bid();
            let delta = self.config.delta;
            let price = metrics.price;
            let policy = self.history;
            for player in self.players.values_mut() {
                let allocation = market_math::allocation_share(player.bid, total, delta);
                player.accrue(to, allocation, price, policy);
            }
        }
        self.clock = self.clock.max(to);
    }

    fn snapshot(&mut self) {
        let metrics = self.instant_metrics();
        self.stats.snapshot(self.clock, &metrics);
    }

    fn verify_population(&mut self) {
        let active = self.players.keys().copied();
        let departed = self.departed.iter().map(|d| d.id);
        if let Err(err) = self.ledger.verify(active, departed) {
            self.counters.conservation_violations += 1;
            error!("t={:.4} population conservation violated: {}", self.clock, err);
        }
    }

    fn schedule(&mut self, time: SimTime, kind: EventKind) -> u64 {
        match self.scheduler.schedule(time, kind) {
            Ok(sequence) => sequence,
            // A past or non-finite time means event ordering is already broken.
            Err(err) => panic!("event ordering invariant violated: {}", err),
        }
    }
}

// ─── Random Draws ────────────────────────────────────────────────────────────

impl MarketSimulation {
    /// Uniform on `[lo, hi)`; `lo` when the range is empty.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.rng.gen::<f64>()
    }

    /// Exponential with the given rate, by inverse transform.
    fn exponential(&mut self, rate: f64) -> f64 {
        let u: f64 = self.rng.gen();
        -(1.0 - u).ln() / rate
    }
}

// ─── Read Access ─────────────────────────────────────────────────────────────

impl MarketSimulation {
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.clock
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn price(&self) -> f64 {
        self.governor.price()
    }

    pub fn utilization(&self) -> f64 {
        market_math::utilization(self.total_bid(), self.config.delta)
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn departed(&self) -> &[DepartureRecord] {
        &self.departed
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn ledger(&self) -> &PopulationLedger {
        &self.ledger
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> MarketConfig {
        MarketConfig {
            background_players: false,
            pricing: crate::config::PricingConfig::fixed(1.0),
            horizon: 10.0,
            ..MarketConfig::default()
        }
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut sim = MarketSimulation::new(quiet_config()).unwrap();
        for _ in 0..1000 {
            let x = sim.uniform(0.1, 0.5);
            assert!((0.1..0.5).contains(&x));
        }
        assert_eq!(sim.uniform(3.0, 3.0), 3.0);
    }

    #[test]
    fn exponential_mean_matches_rate() {
        let mut sim = MarketSimulation::new(quiet_config()).unwrap();
        let n = 20_000;
        let mean = (0..n).map(|_| sim.exponential(0.05)).sum::<f64>() / n as f64;
        assert!((mean - 20.0).abs() < 1.0, "mean {} far from 20", mean);
    }

    #[test]
    fn empty_market_has_nothing_to_dispatch() {
        let mut sim = MarketSimulation::new(quiet_config()).unwrap();
        assert_eq!(sim.pending_events(), 0);
        assert!(sim.step().unwrap().is_none());
        sim.run().unwrap();
        assert_eq!(sim.phase(), RunPhase::Complete);
        assert_eq!(sim.now(), 10.0);
    }

    #[test]
    fn integrals_use_pre_event_state() {
        let mut cfg = quiet_config();
        cfg.permanent_players = vec![crate::config::PermanentPlayerSpec::new(0, "solo", 100.0)];
        let mut sim = MarketSimulation::new(cfg).unwrap();

        // First dispatch is the revision; the seed bid held until then.
        let record = sim.step().unwrap().unwrap();
        let p = sim.player(0).unwrap();
        let expected = 0.1 * 1.0 * record.time;
        assert!((p.cost_integral - expected).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "event ordering invariant violated")]
    fn scheduling_into_the_past_is_fatal() {
        let mut cfg = quiet_config();
        cfg.permanent_players = vec![crate::config::PermanentPlayerSpec::new(0, "solo", 100.0)];
        let mut sim = MarketSimulation::new(cfg).unwrap();
        sim.step().unwrap().unwrap();
        assert!(sim.now() > 0.0);
        sim.schedule(0.0, EventKind::PriceAdjustment);
    }

    #[test]
    fn permanent_player_ignores_voluntary_departure() {
        let mut cfg = quiet_config();
        cfg.permanent_players = vec![crate::config::PermanentPlayerSpec::new(0, "solo", 100.0)];
        let mut sim = MarketSimulation::new(cfg).unwrap();

        assert!(!sim.handle_departure(0, false));
        assert!(sim.player(0).is_some());
        assert!(sim.departed().is_empty());
        assert_eq!(sim.counters().departures, 0);

        assert!(sim.handle_departure(0, true));
        assert!(sim.player(0).is_none());
        assert_eq!(sim.departed().len(), 1);
        assert!(sim.departed()[0].forced);
    }

    #[test]
    fn absent_player_departure_is_stale() {
        let mut sim = MarketSimulation::new(quiet_config()).unwrap();
        assert!(!sim.handle_departure(99, true));
        assert!(!sim.handle_bid_revision(99).unwrap());
    }
}
