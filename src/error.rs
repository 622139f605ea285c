// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Error Types

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Rejected configuration. Raised by [`MarketConfig::validate`](crate::config::MarketConfig::validate)
/// before any event is scheduled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unsupported fairness exponent alpha={0} (expected 0, 1 or 2)")]
    UnsupportedFairnessExponent(u32),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("price bounds inverted: max {max} < min {min}")]
    InvalidPriceBounds { min: f64, max: f64 },

    #[error("initial price {price} outside [{min}, {max}]")]
    InitialPriceOutOfBounds { price: f64, min: f64, max: f64 },

    #[error("{field} range inverted: {min} > {max}")]
    InvalidRange { field: &'static str, min: f64, max: f64 },

    #[error("target utilization {0} outside [0, 1)")]
    TargetUtilizationOutOfRange(f64),

    #[error("permanent player id {0} declared more than once")]
    DuplicatePermanentPlayer(u64),
}

// ---------------------------------------------------------------------------
// Market math errors
// ---------------------------------------------------------------------------

/// Errors from the closed-form bid rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("no closed-form best response for alpha={0}")]
    UnsupportedFairnessExponent(u32),
}

// ---------------------------------------------------------------------------
// Crate error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("market math: {0}")]
    Math(#[from] MathError),
}

pub type Result<T> = std::result::Result<T, MarketError>;
