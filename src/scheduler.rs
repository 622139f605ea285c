// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Event Scheduler
//
// Time-ordered event queue. Events are keyed by (time, sequence): the
// sequence is assigned at insertion and breaks exact timestamp ties in
// insertion order, so every pop is deterministic.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PlayerId, SimTime};

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SchedulerError {
    #[error("cannot schedule at t={requested} (clock is at t={now})")]
    InvalidTime { requested: SimTime, now: SimTime },
}

// ─── Event Kind ─────────────────────────────────────────────────────────────

/// What an event does when dispatched, with its immutable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    PlayerArrival,
    PlayerDeparture { player: PlayerId, forced: bool },
    BidRevision { player: PlayerId },
    PriceAdjustment,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PlayerArrival => "ARRIVAL",
            Self::PlayerDeparture { .. } => "DEPARTURE",
            Self::BidRevision { .. } => "BID_REVISION",
            Self::PriceAdjustment => "PRICE_ADJUSTMENT",
        }
    }

    /// Player targeted by this event, if any.
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerDeparture { player, .. } | Self::BidRevision { player } => Some(*player),
            Self::PlayerArrival | Self::PriceAdjustment => None,
        }
    }
}

// ─── Event Key ──────────────────────────────────────────────────────────────

/// Composite sort key. Times are finite (enforced on insert), so
/// `total_cmp` agrees with numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventKey {
    pub time: SimTime,
    pub sequence: u64,
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

// ─── Scheduled Event ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub key: EventKey,
    pub kind: EventKind,
}

impl ScheduledEvent {
    pub fn time(&self) -> SimTime {
        self.key.time
    }

    pub fn sequence(&self) -> u64 {
        self.key.sequence
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────────────

/// Min-queue of pending events plus the logical clock of the last pop.
///
/// There is no cancellation: an event that became irrelevant stays queued
/// and is ignored by the engine when it fires.
#[derive(Debug, Default)]
pub struct EventScheduler {
    now: SimTime,
    next_sequence: u64,
    queue: BinaryHeap<Reverse<ScheduledEvent>>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the most recently popped event (0 before the first pop).
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of events ever inserted.
    pub fn scheduled_count(&self) -> u64 {
        self.next_sequence
    }

    /// Insert an event and return its sequence number.
    ///
    /// Fails with [`SchedulerError::InvalidTime`] if `time` precedes the
    /// clock or is not finite.
    pub fn schedule(&mut self, time: SimTime, kind: EventKind) -> Result<u64, SchedulerError> {
        if !time.is_finite() || time < self.now {
            return Err(SchedulerError::InvalidTime {
                requested: time,
                now: self.now,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(Reverse(ScheduledEvent {
            key: EventKey { time, sequence },
            kind,
        }));
        Ok(sequence)
    }

    /// Time of the next event without removing it.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(ev)| ev.time())
    }

    /// Remove the event with the smallest (time, sequence) and move the
    /// clock to its time. `None` when the queue is empty.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent> {
        let Reverse(ev) = self.queue.pop()?;
        self.now = ev.time();
        Some(ev)
    }

    /// Move the clock forward without popping (end-of-run finalization).
    pub fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() {
        let mut s = EventScheduler::new();
        s.schedule(3.0, EventKind::PriceAdjustment).unwrap();
        s.schedule(1.0, EventKind::PlayerArrival).unwrap();
        s.schedule(2.0, EventKind::BidRevision { player: 7 }).unwrap();

        let times: Vec<f64> = std::iter::from_fn(|| s.pop_next()).map(|e| e.time()).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
        assert!(s.is_empty());
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut s = EventScheduler::new();
        for player in 0..5 {
            s.schedule(1.5, EventKind::BidRevision { player }).unwrap();
        }
        let players: Vec<PlayerId> = std::iter::from_fn(|| s.pop_next())
            .filter_map(|e| e.kind.player())
            .collect();
        assert_eq!(players, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sequence_numbers_are_unique_and_increasing() {
        let mut s = EventScheduler::new();
        let a = s.schedule(5.0, EventKind::PlayerArrival).unwrap();
        let b = s.schedule(1.0, EventKind::PlayerArrival).unwrap();
        let c = s.schedule(5.0, EventKind::PriceAdjustment).unwrap();
        assert!(a < b && b < c);
        assert_eq!(s.scheduled_count(), 3);
    }

    #[test]
    fn rejects_past_times() {
        let mut s = EventScheduler::new();
        s.schedule(2.0, EventKind::PlayerArrival).unwrap();
        s.pop_next().unwrap();
        assert_eq!(s.now(), 2.0);

        let err = s.schedule(1.0, EventKind::PriceAdjustment).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidTime { requested: 1.0, now: 2.0 });

        // Same instant is allowed.
        assert!(s.schedule(2.0, EventKind::PriceAdjustment).is_ok());
    }

    #[test]
    fn rejects_non_finite_times() {
        let mut s = EventScheduler::new();
        assert!(s.schedule(f64::NAN, EventKind::PlayerArrival).is_err());
        assert!(s.schedule(f64::INFINITY, EventKind::PlayerArrival).is_err());
        assert!(s.is_empty());
    }

    #[test]
    fn peek_does_not_advance_clock() {
        let mut s = EventScheduler::new();
        s.schedule(4.0, EventKind::PlayerArrival).unwrap();
        assert_eq!(s.peek_time(), Some(4.0));
        assert_eq!(s.now(), 0.0);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn pop_on_empty_is_none() {
        let mut s = EventScheduler::new();
        assert!(s.pop_next().is_none());
        assert!(s.peek_time().is_none());
    }

    #[test]
    fn advance_to_never_moves_backwards() {
        let mut s = EventScheduler::new();
        s.advance_to(10.0);
        s.advance_to(4.0);
        assert_eq!(s.now(), 10.0);
    }

    #[test]
    fn key_orders_time_before_sequence() {
        let early_late_seq = EventKey { time: 1.0, sequence: 9 };
        let late_early_seq = EventKey { time: 2.0, sequence: 0 };
        assert!(early_late_seq < late_early_seq);
        let a = EventKey { time: 1.0, sequence: 1 };
        let b = EventKey { time: 1.0, sequence: 2 };
        assert!(a < b);
    }
}
