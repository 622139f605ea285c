// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite - Market Math
//
// Closed-form best responses and alpha-fair payoffs for the Kelly
// proportional-allocation mechanism. Pure functions, no engine state.

use crate::error::MathError;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Allocations below this are treated as zero when valuing them.
pub const ALLOCATION_FLOOR: f64 = 1e-9;

/// Value term assigned to a (near-)zero allocation, for every alpha.
/// Also the lowest value term `utility` will ever report.
pub const UTILITY_PENALTY: f64 = -1e9;

/// Marginal value used by the gradient rule when the allocation is ~0.
pub const LARGE_MARGINAL_VALUE: f64 = 1e9;

// ─── Allocation ─────────────────────────────────────────────────────────────

/// Kelly share of a single bid: `bid / (total_bid + delta)`.
pub fn allocation_share(bid: f64, total_bid: f64, delta: f64) -> f64 {
    let denom = total_bid + delta;
    if denom <= 0.0 || bid <= 0.0 {
        return 0.0;
    }
    bid / denom
}

/// Fraction of the resource handed out: `total / (total + delta)`.
pub fn utilization(total_bid: f64, delta: f64) -> f64 {
    let denom = total_bid + delta;
    if denom <= 0.0 {
        return 0.0;
    }
    total_bid / denom
}

// ─── Bid Rules ──────────────────────────────────────────────────────────────

/// Optimal bid for valuation `a` against competing bid mass `s_minus`.
///
/// `s_minus` must already include the reservation term and be floored to it.
/// The price is floored to `epsilon` and so is the returned bid.
///
/// | alpha | bid |
/// |---|---|
/// | 0 | `sqrt(a*s/p) - s` |
/// | 1 | positive root of `b^2 + s*b - a*s/p = 0` |
/// | 2 | `sqrt(a*s/p)` |
pub fn best_response(
    a: f64,
    s_minus: f64,
    price: f64,
    alpha: u32,
    epsilon: f64,
) -> Result<f64, MathError> {
    let price = price.max(epsilon);
    let ratio = (a * s_minus / price).max(0.0);

    let bid = match alpha {
        0 => ratio.sqrt() - s_minus,
        1 => {
            let disc = s_minus * s_minus + 4.0 * ratio;
            (-s_minus + disc.sqrt()) / 2.0
        }
        2 => ratio.sqrt(),
        other => return Err(MathError::UnsupportedFairnessExponent(other)),
    };

    Ok(bid.max(epsilon))
}

/// One ascent step on the player's own payoff, others' bids held fixed.
///
/// The result is clamped to `[epsilon, budget / price]`.
#[allow(clippy::too_many_arguments)]
pub fn gradient_step_bid(
    current_bid: f64,
    a: f64,
    s_minus: f64,
    price: f64,
    alpha: u32,
    step_size: f64,
    budget: f64,
    epsilon: f64,
) -> f64 {
    let price = price.max(epsilon);
    let bid = current_bid.max(0.0);
    let total = bid + s_minus;

    let (share, d_share) = if total > 0.0 {
        (bid / total, s_minus / (total * total))
    } else {
        (0.0, 0.0)
    };

    let marginal_value = if share < ALLOCATION_FLOOR {
        LARGE_MARGINAL_VALUE
    } else {
        a * share.powi(-(alpha as i32))
    };

    let gradient = marginal_value * d_share - price;
    let ceiling = (budget / price).max(epsilon);
    (bid + step_size * gradient).clamp(epsilon, ceiling)
}

// ─── Payoff ─────────────────────────────────────────────────────────────────

/// Alpha-fair value of `allocation` minus the linear cost `price * bid`.
pub fn utility(a: f64, allocation: f64, price: f64, bid: f64, alpha: u32) -> f64 {
    let value = if allocation < ALLOCATION_FLOOR {
        UTILITY_PENALTY
    } else if alpha == 1 {
        a * allocation.ln()
    } else {
        let exponent = 1.0 - alpha as f64;
        a * allocation.powf(exponent) / exponent
    };

    value.max(UTILITY_PENALTY) - price * bid
}

/// Jain's fairness index `(sum x)^2 / (n * sum x^2)`.
///
/// 1.0 means perfectly equal shares; `1/n` means one player takes everything.
pub fn jain_index(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    let sum_sq: f64 = values.iter().map(|v| v * v).sum();
    if values.is_empty() || sum_sq <= 0.0 {
        return 1.0;
    }
    (sum * sum) / (values.len() as f64 * sum_sq)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-3;
    const DELTA: f64 = 0.1;

    #[test]
    fn best_response_alpha0_closed_form() {
        // sqrt(100 * 4 / 1) - 4 = 16
        let bid = best_response(100.0, 4.0, 1.0, 0, EPS).unwrap();
        assert!((bid - 16.0).abs() < 1e-9);
    }

    #[test]
    fn best_response_alpha0_floors_when_outbid() {
        // sqrt(1 * 100 / 1) - 100 < 0
        let bid = best_response(1.0, 100.0, 1.0, 0, EPS).unwrap();
        assert!((bid - EPS).abs() < 1e-12);
    }

    #[test]
    fn best_response_alpha1_is_quadratic_root() {
        let (a, s, p) = (100.0, DELTA, 1.0);
        let bid = best_response(a, s, p, 1, EPS).unwrap();
        let residual = bid * bid + s * bid - a * s / p;
        assert!(residual.abs() < 1e-9, "residual {}", residual);
        assert!((bid - (-0.1 + (0.01_f64 + 40.0).sqrt()) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn best_response_alpha2_closed_form() {
        let bid = best_response(50.0, 2.0, 4.0, 2, EPS).unwrap();
        assert!((bid - 5.0).abs() < 1e-12);
    }

    #[test]
    fn best_response_rejects_other_alpha() {
        let err = best_response(10.0, 1.0, 1.0, 3, EPS).unwrap_err();
        assert_eq!(err, MathError::UnsupportedFairnessExponent(3));
    }

    #[test]
    fn best_response_zero_price_is_floored() {
        let at_zero = best_response(10.0, 1.0, 0.0, 2, EPS).unwrap();
        let at_eps = best_response(10.0, 1.0, EPS, 2, EPS).unwrap();
        assert!(at_zero.is_finite());
        assert_eq!(at_zero, at_eps);
    }

    #[test]
    fn best_response_alpha2_fixed_point() {
        // Re-applying the rule with s_minus and price held fixed must not drift.
        let mut bid = best_response(120.0, 3.0, 0.7, 2, EPS).unwrap();
        for _ in 0..50 {
            let next = best_response(120.0, 3.0, 0.7, 2, EPS).unwrap();
            assert!((next - bid).abs() < 1e-12);
            bid = next;
        }
        assert!((bid - (120.0_f64 * 3.0 / 0.7).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn gradient_step_moves_toward_best_response() {
        let (a, s, p) = (100.0, 5.0, 1.0);
        let target = best_response(a, s, p, 1, EPS).unwrap();
        let mut bid = 1.0;
        for _ in 0..2000 {
            bid = gradient_step_bid(bid, a, s, p, 1, 0.5, 4000.0, EPS);
        }
        assert!((bid - target).abs() < 1e-3, "bid {} target {}", bid, target);
    }

    #[test]
    fn gradient_step_respects_budget_ceiling() {
        // Huge marginal value at zero allocation pushes the bid up; the budget caps it.
        let bid = gradient_step_bid(0.0, 100.0, 1.0, 2.0, 1, 10.0, 10.0, EPS);
        assert!((bid - 5.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_step_respects_floor() {
        // Price dwarfs marginal value so the step drives the bid negative.
        let bid = gradient_step_bid(0.01, 1.0, 100.0, 50.0, 0, 1.0, 4000.0, EPS);
        assert!((bid - EPS).abs() < 1e-12);
    }

    #[test]
    fn utility_alpha1_log_value() {
        let u = utility(10.0, 0.5, 2.0, 1.0, 1);
        assert!((u - (10.0 * 0.5_f64.ln() - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn utility_alpha0_linear_value() {
        let u = utility(10.0, 0.25, 1.0, 1.5, 0);
        assert!((u - (2.5 - 1.5)).abs() < 1e-12);
    }

    #[test]
    fn utility_alpha2_inverse_value() {
        // a * x^-1 / -1 = -a / x
        let u = utility(4.0, 0.5, 0.0, 0.0, 2);
        assert!((u - (-8.0)).abs() < 1e-12);
    }

    #[test]
    fn utility_zero_allocation_uses_single_sentinel() {
        for alpha in 0..=2 {
            let u = utility(100.0, 0.0, 1.0, 0.0, alpha);
            assert_eq!(u, UTILITY_PENALTY, "alpha={}", alpha);
        }
        // Cost is still charged on top of the sentinel.
        let u = utility(100.0, 1e-12, 2.0, 3.0, 1);
        assert_eq!(u, UTILITY_PENALTY - 6.0);
    }

    #[test]
    fn utility_never_below_sentinel_value() {
        // alpha=2 at a tiny but valid allocation would blow past -1e9.
        let u = utility(1e4, 2e-9, 0.0, 0.0, 2);
        assert_eq!(u, UTILITY_PENALTY);
    }

    #[test]
    fn allocation_and_utilization() {
        assert!((allocation_share(1.0, 3.9, DELTA) - 0.25).abs() < 1e-12);
        assert_eq!(allocation_share(0.0, 3.9, DELTA), 0.0);
        assert!((utilization(0.9, DELTA) - 0.9).abs() < 1e-12);
        assert_eq!(utilization(0.0, DELTA), 0.0);
        assert!(utilization(1e12, DELTA) < 1.0);
    }

    #[test]
    fn jain_index_bounds() {
        assert!((jain_index(&[0.2, 0.2, 0.2]) - 1.0).abs() < 1e-12);
        assert!((jain_index(&[1.0, 0.0, 0.0, 0.0]) - 0.25).abs() < 1e-12);
        assert_eq!(jain_index(&[]), 1.0);
    }
}
