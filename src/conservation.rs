// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Population Conservation
//
// Every player ever created is either active or departed, never both:
//
//   |active| + |departed| == created,   active ∩ departed == ∅

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PlayerId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConservationError {
    #[error("population mismatch: {active} active + {departed} departed != {created} created")]
    PopulationMismatch {
        active: usize,
        departed: usize,
        created: u64,
    },

    #[error("player {0} is both active and departed")]
    DuplicateIdentity(PlayerId),
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Counts creations and checks them against the engine's live collections.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PopulationLedger {
    /// Players ever admitted (background and permanent).
    pub created: u64,
    /// Checks run so far.
    pub checks: u64,
    /// Checks that failed.
    pub violations: u64,
    /// Failed checks since the last passing one.
    pub consecutive_violations: u32,
}

impl PopulationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&mut self) {
        self.created += 1;
    }

    /// Verify the population law against the current active and departed
    /// identities.
    pub fn verify<A, D>(&mut self, active: A, departed: D) -> Result<(), ConservationError>
    where
        A: IntoIterator<Item = PlayerId>,
        D: IntoIterator<Item = PlayerId>,
    {
        self.checks += 1;
        let result = check(self.created, active, departed);

        match result {
            Ok(()) => self.consecutive_violations = 0,
            Err(_) => {
                self.violations += 1;
                self.consecutive_violations += 1;
            }
        }
        result
    }

    pub fn is_balanced(&self) -> bool {
        self.violations == 0
    }
}

fn check<A, D>(created: u64, active: A, departed: D) -> Result<(), ConservationError>
where
    A: IntoIterator<Item = PlayerId>,
    D: IntoIterator<Item = PlayerId>,
{
    let active: BTreeSet<PlayerId> = active.into_iter().collect();
    let mut departed_count = 0usize;

    for id in departed {
        departed_count += 1;
        if active.contains(&id) {
            return Err(ConservationError::DuplicateIdentity(id));
        }
    }

    if (active.len() + departed_count) as u64 != created {
        return Err(ConservationError::PopulationMismatch {
            active: active.len(),
            departed: departed_count,
            created,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(created: u64) -> PopulationLedger {
        let mut ledger = PopulationLedger::new();
        for _ in 0..created {
            ledger.record_created();
        }
        ledger
    }

    #[test]
    fn test_empty_ledger_balances() {
        let mut ledger = PopulationLedger::new();
        assert!(ledger.verify(Vec::new(), Vec::new()).is_ok());
        assert_eq!(ledger.checks, 1);
        assert!(ledger.is_balanced());
    }

    #[test]
    fn test_active_plus_departed_matches() {
        let mut ledger = ledger_with(3);
        assert!(ledger.verify(vec![0, 2], vec![1]).is_ok());
    }

    #[test]
    fn test_missing_player_is_mismatch() {
        let mut ledger = ledger_with(3);
        let err = ledger.verify(vec![0], vec![1]).unwrap_err();
        assert_eq!(
            err,
            ConservationError::PopulationMismatch {
                active: 1,
                departed: 1,
                created: 3
            }
        );
        assert_eq!(ledger.violations, 1);
        assert!(!ledger.is_balanced());
    }

    #[test]
    fn test_overlap_is_duplicate_identity() {
        let mut ledger = ledger_with(2);
        let err = ledger.verify(vec![0, 1], vec![1]).unwrap_err();
        assert_eq!(err, ConservationError::DuplicateIdentity(1));
    }

    #[test]
    fn test_passing_check_resets_consecutive() {
        let mut ledger = ledger_with(1);
        let _ = ledger.verify(Vec::new(), Vec::new());
        let _ = ledger.verify(Vec::new(), Vec::new());
        assert_eq!(ledger.consecutive_violations, 2);
        assert!(ledger.verify(vec![0], Vec::new()).is_ok());
        assert_eq!(ledger.consecutive_violations, 0);
        assert_eq!(ledger.violations, 2);
    }
}
