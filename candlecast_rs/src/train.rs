use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{Dataset, Matrix, TargetField};

pub const DEFAULT_ITERATIONS: usize = 5_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

impl Device {
    pub fn from_gpu_flag(gpu: bool) -> Self {
        if gpu { Device::Gpu } else { Device::Cpu }
    }
}

/// One model to fit: a single target column of the dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingJob {
    pub target: TargetField,
    pub iterations: usize,
    pub device: Device,
}

/// External regression trainer fitting one target column at a time.
pub trait Regressor {
    fn fit(&mut self, features: &Matrix, target: &[f64], job: &TrainingJob) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingPlan {
    pub jobs: Vec<TrainingJob>,
}

impl TrainingPlan {
    /// Low and high models, the pair used to bracket the next candle.
    pub fn low_high(iterations: usize, device: Device) -> Self {
        Self::for_targets(&[TargetField::Low, TargetField::High], iterations, device)
    }

    pub fn for_targets(targets: &[TargetField], iterations: usize, device: Device) -> Self {
        Self {
            jobs: targets
                .iter()
                .map(|&target| TrainingJob {
                    target,
                    iterations,
                    device,
                })
                .collect(),
        }
    }

    /// Fit one fresh regressor per job, in plan order.
    pub fn run<R, F>(&self, dataset: &Dataset, mut make_regressor: F) -> Result<Vec<R>>
    where
        R: Regressor,
        F: FnMut(&TrainingJob) -> R,
    {
        if dataset.is_empty() {
            bail!("Cannot train on an empty dataset");
        }
        let mut models = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let target = dataset.target_column(job.target);
            info!(
                target = job.target.name(),
                rows = dataset.len(),
                iterations = job.iterations,
                device = ?job.device,
                "fitting regressor"
            );
            let mut model = make_regressor(job);
            model
                .fit(dataset.features(), &target, job)
                .with_context(|| format!("Failed to fit {} model", job.target.name()))?;
            models.push(model);
        }
        Ok(models)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Unable to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("Failed to serialize training plan to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::CandleTable;
    use crate::dataset::build_dataset;
    use anyhow::anyhow;
    use chrono::Duration;

    #[derive(Default)]
    struct Recorder {
        rows: usize,
        target: Vec<f64>,
    }

    impl Regressor for Recorder {
        fn fit(&mut self, features: &Matrix, target: &[f64], _job: &TrainingJob) -> Result<()> {
            self.rows = features.rows();
            self.target = target.to_vec();
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Diverging;

    impl Regressor for Diverging {
        fn fit(&mut self, _: &Matrix, _: &[f64], _: &TrainingJob) -> Result<()> {
            Err(anyhow!("loss is NaN"))
        }
    }

    fn sample_dataset() -> Dataset {
        let table = CandleTable::new(
            vec![0, 60, 120, 180],
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.5, 1.5, 2.5, 3.5],
            vec![1.5, 2.5, 3.5, 4.5],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        build_dataset(&table, Duration::minutes(1), 3).unwrap()
    }

    #[test]
    fn low_high_plan_fits_low_then_high() -> Result<()> {
        let dataset = sample_dataset();
        let plan = TrainingPlan::low_high(DEFAULT_ITERATIONS, Device::from_gpu_flag(false));
        let mut seen = Vec::new();
        let models: Vec<Recorder> = plan.run(&dataset, |job| {
            seen.push(job.target);
            Recorder::default()
        })?;
        assert_eq!(seen, vec![TargetField::Low, TargetField::High]);
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].rows, 2);
        assert_eq!(models[0].target, dataset.target_column(TargetField::Low));
        assert_eq!(models[1].target, dataset.target_column(TargetField::High));
        Ok(())
    }

    #[test]
    fn fit_failures_propagate() {
        let dataset = sample_dataset();
        let plan = TrainingPlan::low_high(10, Device::Gpu);
        let err = plan
            .run(&dataset, |_| Diverging)
            .expect_err("diverging fit must surface");
        assert!(format!("{err:#}").contains("loss is NaN"));
    }

    #[test]
    fn plan_serializes_snake_case() -> Result<()> {
        let plan = TrainingPlan::low_high(5, Device::Gpu);
        let json = serde_json::to_string(&plan)?;
        assert!(json.contains("\"target\":\"low\""));
        assert!(json.contains("\"device\":\"gpu\""));
        Ok(())
    }
}
