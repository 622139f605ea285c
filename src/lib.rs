// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Kelly Market Simulation Suite

pub mod types;
pub mod error;
pub mod config;
pub mod market_math;
pub mod scheduler;
pub mod statistics;
pub mod governor;
pub mod conservation;
pub mod simulation;

pub use config::{BidStrategy, MarketConfig, PermanentPlayerSpec, PricingConfig};
pub use error::{ConfigError, MarketError, MathError, Result};
pub use scheduler::{EventKind, EventScheduler, ScheduledEvent, SchedulerError};
pub use simulation::{run, MarketSimulation};
pub use statistics::{InstantMetrics, MarketSeries, SampleStats, SummaryStats};
pub use types::*;

use wasm_bindgen::prelude::*;

fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
}

fn to_js_error(err: MarketError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Run one market to completion. `config` is a (possibly partial)
/// `MarketConfig` object; missing fields take their defaults.
#[wasm_bindgen]
pub fn run_market(config: JsValue) -> std::result::Result<JsValue, JsValue> {
    install_panic_hook();
    let config: MarketConfig = serde_wasm_bindgen::from_value(config)?;
    let result = run(&config).map_err(to_js_error)?;
    Ok(serde_wasm_bindgen::to_value(&result)?)
}

#[wasm_bindgen]
pub fn default_config() -> JsValue {
    serde_wasm_bindgen::to_value(&MarketConfig::default()).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
impl MarketSimulation {
    #[wasm_bindgen(constructor)]
    pub fn create(config: JsValue) -> std::result::Result<MarketSimulation, JsValue> {
        install_panic_hook();
        let config: MarketConfig = serde_wasm_bindgen::from_value(config)?;
        MarketSimulation::new(config).map_err(to_js_error)
    }

    /// Dispatch one event; `null` once the horizon is reached.
    pub fn tick(&mut self) -> std::result::Result<JsValue, JsValue> {
        match self.step().map_err(to_js_error)? {
            Some(record) => Ok(serde_wasm_bindgen::to_value(&record)?),
            None => Ok(JsValue::NULL),
        }
    }

    /// Dispatch up to `events` events without returning them.
    pub fn run_batch(&mut self, events: u32) -> std::result::Result<u32, JsValue> {
        let mut dispatched = 0;
        while dispatched < events {
            if self.step().map_err(to_js_error)?.is_none() {
                break;
            }
            dispatched += 1;
        }
        Ok(dispatched)
    }

    pub fn get_time(&self) -> f64 {
        self.now()
    }

    pub fn get_price(&self) -> f64 {
        self.price()
    }

    pub fn get_metrics(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.instant_metrics()).unwrap_or(JsValue::NULL)
    }

    pub fn get_players(&self) -> JsValue {
        let players: Vec<&Player> = self.active_players().collect();
        serde_wasm_bindgen::to_value(&players).unwrap_or(JsValue::NULL)
    }

    pub fn get_departed(&self) -> JsValue {
        serde_wasm_bindgen::to_value(self.departed()).unwrap_or(JsValue::NULL)
    }

    pub fn get_counters(&self) -> JsValue {
        serde_wasm_bindgen::to_value(self.counters()).unwrap_or(JsValue::NULL)
    }
}
