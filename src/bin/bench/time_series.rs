// Per-Snapshot JSONL Time Series Recorder
// Outputs one JSON line per market snapshot for independent analysis

use kelly_engine::MarketSeries;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct MarketSnapshot {
    pub time: f64,
    pub player_count: f64,
    pub utilization: f64,
    pub avg_bid: f64,
    pub social_welfare: f64,
    pub avg_satisfaction: f64,
    pub price: f64,
}

/// Time series recorder that flattens the six engine series into rows and writes JSONL
pub struct TimeSeriesRecorder {
    snapshots: Vec<MarketSnapshot>,
}

impl TimeSeriesRecorder {
    pub fn from_series(series: &MarketSeries) -> Self {
        let snapshots = (0..series.len())
            .map(|i| MarketSnapshot {
                time: series.price[i].time,
                player_count: series.player_count[i].value,
                utilization: series.utilization[i].value,
                avg_bid: series.avg_bid[i].value,
                social_welfare: series.social_welfare[i].value,
                avg_satisfaction: series.avg_satisfaction[i].value,
                price: series.price[i].value,
            })
            .collect();
        Self { snapshots }
    }

    /// Write all snapshots to a JSONL file
    pub fn write_jsonl(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}
