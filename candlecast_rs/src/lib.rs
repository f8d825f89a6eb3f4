pub mod candles;
pub mod config;
pub mod dataset;
pub mod frame;
pub mod mask;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod train;

pub use candles::{Candle, CandleTable};
pub use config::{CandleInput, Config};
pub use dataset::{DEFAULT_BARS, Dataset, Matrix, TargetField, build_dataset};
pub use frame::TimeFrame;
pub use pipeline::DatasetPipeline;
pub use query::{CandleQuery, build_candle_query};
pub use store::{CandleSource, CsvCandleSource, DuckDbSource};
pub use train::{Device, Regressor, TrainingPlan};
