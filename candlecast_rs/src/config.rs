use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::{DEFAULT_BARS, TargetField};
use crate::frame::TimeFrame;
use crate::query::{CandleQuery, DEFAULT_MARKET, DEFAULT_SCHEMA};
use crate::train::{DEFAULT_ITERATIONS, Device, TrainingPlan};

/// Where candles are read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CandleInput {
    /// DuckDB catalog holding `{schema}.{market}_{pair}_trades`.
    Database(PathBuf),
    /// Already aggregated candles with `time, open, low, high, close` columns.
    Csv(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: CandleInput,
    pub output_dir: PathBuf,
    pub pair: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Bucket granularity for aggregation; its duration is also the exact
    /// spacing required between candles inside a window.
    #[serde(default)]
    pub frame: TimeFrame,
    /// Candles per window; the last one is the prediction target.
    #[serde(default = "default_bars")]
    pub bars: usize,
    #[serde(default)]
    pub device: Device,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Target columns to train one model each on.
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetField>,
    /// Log the query and stop before touching the store.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub quiet: bool,
}

impl Config {
    pub fn candle_query(&self) -> CandleQuery {
        CandleQuery::new(self.pair.clone())
            .with_market(self.market.clone())
            .with_frame(self.frame)
            .with_schema(self.schema.clone())
    }

    pub fn training_plan(&self) -> TrainingPlan {
        TrainingPlan::for_targets(&self.targets, self.iterations, self.device)
    }
}

fn default_market() -> String {
    DEFAULT_MARKET.to_string()
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

const fn default_bars() -> usize {
    DEFAULT_BARS
}

const fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_targets() -> Vec<TargetField> {
    vec![TargetField::Low, TargetField::High]
}
