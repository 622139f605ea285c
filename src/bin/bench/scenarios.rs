// Scenario Definitions: fairness, strategy and pricing experiments
// Every scenario is a MarketConfig derived from one shared base

use kelly_engine::{BidStrategy, MarketConfig, PricingConfig};

const GRADIENT_STEP: f64 = 2.0;
const STATIC_PRICE: f64 = 2.0;

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: String,
    pub category: &'static str,
    pub config: MarketConfig,
    pub criteria: PassCriteria,
}

/// Invariants every run must keep.
pub struct PassCriteria {
    pub max_conservation_violations: u64,
    pub max_utilization: f64,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            max_conservation_violations: 0,
            max_utilization: 1.0,
        }
    }
}

fn scenario(
    name: &'static str,
    category: &'static str,
    label: impl Into<String>,
    config: MarketConfig,
) -> Scenario {
    let label = label.into();
    Scenario {
        name,
        category,
        config: MarketConfig {
            label: label.clone(),
            ..config
        },
        label,
        criteria: PassCriteria::default(),
    }
}

// ─── Experiments ────────────────────────────────────────────────────────────

/// Fairness exponents 0, 1 and 2 under the same traffic.
fn fairness(base: &MarketConfig) -> Vec<Scenario> {
    [
        ("FAIRNESS_ALPHA_0", 0),
        ("FAIRNESS_ALPHA_1", 1),
        ("FAIRNESS_ALPHA_2", 2),
    ]
    .into_iter()
    .map(|(name, alpha)| {
        let preset = MarketConfig::for_alpha(alpha);
        let config = MarketConfig {
            alpha,
            ..base.clone()
        };
        scenario(name, "fairness", preset.label, config)
    })
    .collect()
}

/// Closed-form best response against gradient ascent, α=1.
fn strategy(base: &MarketConfig) -> Vec<Scenario> {
    let alpha1 = MarketConfig { alpha: 1, ..base.clone() };
    vec![
        scenario(
            "STRATEGY_BEST_RESPONSE",
            "strategy",
            "Best response",
            MarketConfig {
                strategy: BidStrategy::BestResponse,
                ..alpha1.clone()
            },
        ),
        scenario(
            "STRATEGY_GRADIENT",
            "strategy",
            format!("Gradient (step {})", GRADIENT_STEP),
            MarketConfig {
                strategy: BidStrategy::GradientAscent {
                    step_size: GRADIENT_STEP,
                },
                ..alpha1
            },
        ),
    ]
}

/// Feedback-controlled price against a fixed one, α=1.
fn pricing(base: &MarketConfig) -> Vec<Scenario> {
    let alpha1 = MarketConfig { alpha: 1, ..base.clone() };
    let static_pricing = PricingConfig {
        enabled: false,
        initial_price: STATIC_PRICE,
        ..alpha1.pricing.clone()
    };
    vec![
        scenario("PRICING_DYNAMIC", "pricing", "Dynamic price", alpha1.clone()),
        scenario(
            "PRICING_STATIC",
            "pricing",
            format!("Static price {}", STATIC_PRICE),
            MarketConfig {
                pricing: static_pricing,
                ..alpha1
            },
        ),
    ]
}

/// All experiments built on `base`.
pub fn scenarios(base: &MarketConfig) -> Vec<Scenario> {
    let mut all = fairness(base);
    all.extend(strategy(base));
    all.extend(pricing(base));
    all
}

/// A single scenario running `config` unchanged.
pub fn custom(config: MarketConfig) -> Scenario {
    let label = config.label.clone();
    scenario("CUSTOM", "custom", label, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_is_valid() {
        for s in scenarios(&MarketConfig::hybrid()) {
            assert!(s.config.validate().is_ok(), "{} invalid", s.name);
            assert_eq!(s.config.label, s.label);
        }
    }

    #[test]
    fn experiments_vary_one_knob() {
        let all = scenarios(&MarketConfig::hybrid());
        assert_eq!(all.len(), 7);
        let alphas: Vec<u32> = all
            .iter()
            .filter(|s| s.category == "fairness")
            .map(|s| s.config.alpha)
            .collect();
        assert_eq!(alphas, vec![0, 1, 2]);

        let fixed = all.iter().find(|s| s.name == "PRICING_STATIC").unwrap();
        assert!(!fixed.config.pricing.enabled);
        assert_eq!(fixed.config.pricing.initial_price, STATIC_PRICE);
    }
}
