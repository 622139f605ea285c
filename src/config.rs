// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Run Configuration

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::PlayerId;

// ─── Constants ──────────────────────────────────────────────────────────────

pub const LABEL_EFFICIENCY: &str = "α=0 (Efficiency)";
pub const LABEL_PROPORTIONAL_FAIR: &str = "α=1 (Proportional Fair)";
pub const LABEL_MIN_POTENTIAL_DELAY: &str = "α=2 (Min-Potential Delay)";

const DEFAULT_GRADIENT_STEP: f64 = 0.5;

// ─── Bid Strategy ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStrategy {
    /// Closed-form best response to the other players' current bids.
    BestResponse,
    /// One gradient-ascent step on the player's own payoff per revision.
    GradientAscent { step_size: f64 },
}

impl BidStrategy {
    pub fn gradient() -> Self {
        Self::GradientAscent {
            step_size: DEFAULT_GRADIENT_STEP,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BestResponse => "best-response",
            Self::GradientAscent { .. } => "gradient",
        }
    }
}

impl Default for BidStrategy {
    fn default() -> Self {
        Self::BestResponse
    }
}

// ─── Pricing ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// When false the price stays at `initial_price` for the whole run.
    pub enabled: bool,
    pub interval: f64,
    /// Proportional gain `K`.
    pub gain: f64,
    pub initial_price: f64,
    pub target_utilization: f64,
    pub min_price: f64,
    pub max_price: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 5.0,
            gain: 0.25,
            initial_price: 1.0,
            target_utilization: 0.75,
            min_price: 0.05,
            max_price: 50.0,
        }
    }
}

impl PricingConfig {
    /// Fixed price, no controller.
    pub fn fixed(price: f64) -> Self {
        Self {
            enabled: false,
            initial_price: price,
            ..Self::default()
        }
    }
}

// ─── Permanent Players ──────────────────────────────────────────────────────

/// A player present from t=0 that only leaves when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentPlayerSpec {
    pub id: PlayerId,
    pub label: String,
    pub valuation: f64,
}

impl PermanentPlayerSpec {
    pub fn new(id: PlayerId, label: impl Into<String>, valuation: f64) -> Self {
        Self {
            id,
            label: label.into(),
            valuation,
        }
    }
}

// ─── Market Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub label: String,
    /// Fairness exponent; 0, 1 or 2.
    pub alpha: u32,
    /// Background arrivals per unit time.
    pub arrival_rate: f64,
    pub mean_sojourn: f64,
    pub valuation_min: f64,
    pub valuation_max: f64,
    /// A bid never exceeds `budget / price`.
    pub budget: f64,
    pub revision_delay_min: f64,
    pub revision_delay_max: f64,
    /// Reservation constant added to every bid total.
    pub delta: f64,
    /// Minimum bid.
    pub epsilon: f64,
    pub strategy: BidStrategy,
    pub pricing: PricingConfig,
    pub horizon: f64,
    pub seed: u64,
    pub background_players: bool,
    pub permanent_players: Vec<PermanentPlayerSpec>,
    /// Opening bid of permanent players.
    pub seed_bid: f64,
    pub history_capacity: usize,
    pub history_min_interval: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            label: LABEL_PROPORTIONAL_FAIR.to_string(),
            alpha: 1,
            arrival_rate: 1.0,
            mean_sojourn: 20.0,
            valuation_min: 100.0,
            valuation_max: 400.0,
            budget: 4000.0,
            revision_delay_min: 0.1,
            revision_delay_max: 0.5,
            delta: 0.1,
            epsilon: 1e-3,
            strategy: BidStrategy::BestResponse,
            pricing: PricingConfig::default(),
            horizon: 1000.0,
            seed: 42,
            background_players: true,
            permanent_players: Vec::new(),
            seed_bid: 0.1,
            history_capacity: 1024,
            history_min_interval: 1.0,
        }
    }
}

impl MarketConfig {
    /// Base configuration for one fairness exponent, labelled accordingly.
    pub fn for_alpha(alpha: u32) -> Self {
        let label = match alpha {
            0 => LABEL_EFFICIENCY.to_string(),
            1 => LABEL_PROPORTIONAL_FAIR.to_string(),
            2 => LABEL_MIN_POTENTIAL_DELAY.to_string(),
            other => format!("α={}", other),
        };
        Self {
            label,
            alpha,
            ..Self::default()
        }
    }

    /// The ten reference players, poorest to richest.
    pub fn test_subjects() -> Vec<PermanentPlayerSpec> {
        [
            ("Pauper 1", 10.0),
            ("Pauper 2", 20.0),
            ("Poor 1", 40.0),
            ("Poor 2", 60.0),
            ("Avg 1", 80.0),
            ("Avg 2", 100.0),
            ("Rich 1", 130.0),
            ("Rich 2", 160.0),
            ("Whale 1", 190.0),
            ("Whale 2", 250.0),
        ]
        .iter()
        .enumerate()
        .map(|(i, (label, a))| PermanentPlayerSpec::new(i as PlayerId, *label, *a))
        .collect()
    }

    /// Ten test subjects in a light background crowd, tuned for the
    /// fairness, strategy and pricing experiments.
    pub fn hybrid() -> Self {
        Self {
            arrival_rate: 0.5,
            mean_sojourn: 40.0,
            horizon: 500.0,
            valuation_min: 10.0,
            valuation_max: 100.0,
            budget: 500.0,
            revision_delay_min: 0.1,
            revision_delay_max: 0.3,
            epsilon: 1e-4,
            pricing: PricingConfig {
                enabled: true,
                interval: 1.0,
                gain: 0.05,
                initial_price: 0.1,
                target_utilization: 0.80,
                min_price: 0.01,
                max_price: 1000.0,
            },
            permanent_players: Self::test_subjects(),
            ..Self::default()
        }
    }

    pub fn with_test_subjects(mut self) -> Self {
        self.permanent_players = Self::test_subjects();
        self
    }

    /// Reject anything the engine cannot run. Called before any event is
    /// scheduled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alpha > 2 {
            return Err(ConfigError::UnsupportedFairnessExponent(self.alpha));
        }

        positive("arrival_rate", self.arrival_rate)?;
        positive("mean_sojourn", self.mean_sojourn)?;
        positive("budget", self.budget)?;
        positive("delta", self.delta)?;
        positive("epsilon", self.epsilon)?;
        positive("horizon", self.horizon)?;
        positive("valuation_min", self.valuation_min)?;
        ordered("valuation", self.valuation_min, self.valuation_max)?;

        non_negative("revision_delay_min", self.revision_delay_min)?;
        ordered("revision_delay", self.revision_delay_min, self.revision_delay_max)?;
        non_negative("seed_bid", self.seed_bid)?;
        non_negative("history_min_interval", self.history_min_interval)?;

        if let BidStrategy::GradientAscent { step_size } = self.strategy {
            positive("step_size", step_size)?;
        }

        let p = &self.pricing;
        positive("pricing.interval", p.interval)?;
        positive("pricing.initial_price", p.initial_price)?;
        positive("pricing.min_price", p.min_price)?;
        positive("pricing.max_price", p.max_price)?;
        non_negative("pricing.gain", p.gain)?;
        if p.max_price < p.min_price {
            return Err(ConfigError::InvalidPriceBounds {
                min: p.min_price,
                max: p.max_price,
            });
        }
        if p.initial_price < p.min_price || p.initial_price > p.max_price {
            return Err(ConfigError::InitialPriceOutOfBounds {
                price: p.initial_price,
                min: p.min_price,
                max: p.max_price,
            });
        }
        if !(0.0..1.0).contains(&p.target_utilization) {
            return Err(ConfigError::TargetUtilizationOutOfRange(p.target_utilization));
        }

        let mut seen = BTreeSet::new();
        for spec in &self.permanent_players {
            if !seen.insert(spec.id) {
                return Err(ConfigError::DuplicatePermanentPlayer(spec.id));
            }
            positive("permanent_players.valuation", spec.valuation)?;
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositive { field, value });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field, value });
    }
    Ok(())
}

fn ordered(field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(field, min)?;
    finite(field, max)?;
    if min > max {
        return Err(ConfigError::InvalidRange { field, min, max });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
