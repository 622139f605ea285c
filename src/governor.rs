// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Price Governor
//
// Proportional feedback controller that nudges the market price toward a
// target utilization:
//
//   price <- clamp(price * (1 + gain * (u - target)), min_price, max_price)
//
// Above-target utilization raises the price, below-target lowers it.

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Utilization error below which the market is reported as balanced.
const BALANCED_BAND: f64 = 0.02;

// ─── Pressure ───────────────────────────────────────────────────────────────

/// Direction of the last adjustment, for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketPressure {
    Balanced,
    Congested,
    Slack,
}

impl MarketPressure {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Balanced => "BALANCED",
            Self::Congested => "CONGESTED: RAISING",
            Self::Slack => "SLACK: LOWERING",
        }
    }

    fn classify(error: f64) -> Self {
        if error.abs() < BALANCED_BAND {
            Self::Balanced
        } else if error > 0.0 {
            Self::Congested
        } else {
            Self::Slack
        }
    }
}

// ─── Adjustment ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub previous_price: f64,
    pub price: f64,
    pub utilization: f64,
    /// `utilization - target`.
    pub error: f64,
    pub pressure: MarketPressure,
    /// The unclamped update left `[min_price, max_price]`.
    pub clamped: bool,
}

// ─── Governor ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceGovernor {
    pub gain: f64,
    pub target_utilization: f64,
    pub min_price: f64,
    pub max_price: f64,
    price: f64,
    adjustments: u64,
}

impl PriceGovernor {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            gain: pricing.gain,
            target_utilization: pricing.target_utilization,
            min_price: pricing.min_price,
            max_price: pricing.max_price,
            price: pricing.initial_price.clamp(pricing.min_price, pricing.max_price),
            adjustments: 0,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn adjustments(&self) -> u64 {
        self.adjustments
    }

    /// Run one control step against the observed utilization.
    pub fn adjust(&mut self, utilization: f64) -> PriceAdjustment {
        let previous_price = self.price;
        let error = utilization - self.target_utilization;
        let raw = previous_price * (1.0 + self.gain * error);
        let price = raw.clamp(self.min_price, self.max_price);

        self.price = price;
        self.adjustments += 1;

        PriceAdjustment {
            previous_price,
            price,
            utilization,
            error,
            pressure: MarketPressure::classify(error),
            clamped: raw != price,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> PricingConfig {
        PricingConfig {
            enabled: true,
            interval: 5.0,
            gain: 0.25,
            initial_price: 1.0,
            target_utilization: 0.75,
            min_price: 0.05,
            max_price: 50.0,
        }
    }

    #[test]
    fn raises_price_above_target() {
        let mut gov = PriceGovernor::new(&pricing());
        let adj = gov.adjust(0.95);
        // 1.0 * (1 + 0.25 * 0.2) = 1.05
        assert!((adj.price - 1.05).abs() < 1e-12);
        assert_eq!(adj.pressure, MarketPressure::Congested);
        assert!(!adj.clamped);
        assert_eq!(gov.price(), adj.price);
    }

    #[test]
    fn lowers_price_below_target() {
        let mut gov = PriceGovernor::new(&pricing());
        let adj = gov.adjust(0.35);
        assert!((adj.price - 0.9).abs() < 1e-12);
        assert_eq!(adj.pressure, MarketPressure::Slack);
    }

    #[test]
    fn at_target_price_is_unchanged() {
        let mut gov = PriceGovernor::new(&pricing());
        let adj = gov.adjust(0.75);
        assert_eq!(adj.price, 1.0);
        assert_eq!(adj.pressure, MarketPressure::Balanced);
    }

    #[test]
    fn clamps_to_bounds() {
        let mut cfg = pricing();
        cfg.gain = 100.0;
        cfg.initial_price = 10.0;
        let mut gov = PriceGovernor::new(&cfg);

        let up = gov.adjust(0.99);
        assert_eq!(up.price, 50.0);
        assert!(up.clamped);

        let down = gov.adjust(0.0);
        assert_eq!(down.price, 0.05);
        assert!(down.clamped);
        assert_eq!(gov.adjustments(), 2);
    }

    #[test]
    fn repeated_slack_stays_in_bounds() {
        let mut gov = PriceGovernor::new(&pricing());
        for _ in 0..500 {
            let adj = gov.adjust(0.0);
            assert!(adj.price >= 0.05 && adj.price <= 50.0);
        }
        assert!((gov.price() - 0.05).abs() < 1e-12);
    }
}
