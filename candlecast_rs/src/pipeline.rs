use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{CandleInput, Config};
use crate::dataset::{Dataset, build_dataset};
use crate::store::{CandleSource, CsvCandleSource, DuckDbSource};

pub const DATASET_FILE: &str = "dataset.csv";
pub const TRAINING_PLAN_FILE: &str = "training_plan.json";

#[derive(Debug)]
pub struct PipelineOutcome {
    pub query: String,
    /// `None` for dry runs.
    pub dataset: Option<Dataset>,
    pub dataset_path: Option<PathBuf>,
    pub plan_path: Option<PathBuf>,
}

/// Query, window and export one pair's candles for the external trainer.
pub struct DatasetPipeline {
    config: Config,
}

impl DatasetPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run against the source named by the configured input.
    pub fn run(&self) -> Result<PipelineOutcome> {
        match &self.config.input {
            CandleInput::Database(path) => {
                if self.config.dry_run {
                    return self.run_dry();
                }
                let source = DuckDbSource::open(path)?;
                self.run_with(&source)
            }
            CandleInput::Csv(path) => self.run_with(&CsvCandleSource::new(path.clone())),
        }
    }

    pub fn run_with(&self, source: &dyn CandleSource) -> Result<PipelineOutcome> {
        if self.config.dry_run {
            return self.run_dry();
        }
        let query = self.config.candle_query();
        let sql = query.to_sql();
        self.log_start(&sql);

        let started = Instant::now();
        let candles = source
            .fetch(&query)
            .with_context(|| format!("Failed to fetch candles for {}", query.table_name()))?;
        let dataset = build_dataset(&candles, self.config.frame.duration(), self.config.bars)?;
        let stats = dataset.stats();
        info!(
            candles = stats.candles,
            windows = stats.windows,
            kept = stats.kept,
            misaligned = stats.misaligned,
            features = dataset.features().cols(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dataset windowed"
        );
        if dataset.is_empty() {
            warn!(
                candles = stats.candles,
                bars = self.config.bars,
                "No aligned windows; the dataset is empty"
            );
        }

        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("Unable to create {}", self.config.output_dir.display())
        })?;
        let dataset_path = self.config.output_dir.join(DATASET_FILE);
        dataset.write_csv(&dataset_path)?;
        let plan_path = self.config.output_dir.join(TRAINING_PLAN_FILE);
        self.config.training_plan().write_json(&plan_path)?;
        info!(
            dataset = %dataset_path.display(),
            plan = %plan_path.display(),
            rows = dataset.len(),
            "Wrote dataset and training plan"
        );

        Ok(PipelineOutcome {
            query: sql,
            dataset: Some(dataset),
            dataset_path: Some(dataset_path),
            plan_path: Some(plan_path),
        })
    }

    fn run_dry(&self) -> Result<PipelineOutcome> {
        let sql = self.config.candle_query().to_sql();
        self.log_start(&sql);
        info!("Dry run requested; skipping candle fetch");
        Ok(PipelineOutcome {
            query: sql,
            dataset: None,
            dataset_path: None,
            plan_path: None,
        })
    }

    fn log_start(&self, sql: &str) {
        info!(
            pair = %self.config.pair,
            market = %self.config.market,
            frame = %self.config.frame,
            bars = self.config.bars,
            output = %self.config.output_dir.display(),
            "Starting dataset pipeline"
        );
        if !self.config.quiet {
            info!("candle query:\n{sql}");
        }
    }
}
