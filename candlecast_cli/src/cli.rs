use std::path::PathBuf;

use anyhow::{Context, Result};
use candlecast_rs::TimeFrame;
use candlecast_rs::config::{CandleInput, Config};
use candlecast_rs::dataset::{DEFAULT_BARS, TargetField};
use candlecast_rs::query::{CandleQuery, DEFAULT_MARKET, DEFAULT_SCHEMA};
use candlecast_rs::train::{DEFAULT_ITERATIONS, Device};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "candlecast",
    about = "Aggregate trades into candles and build windowed training datasets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the candle aggregation query for a pair
    #[command(name = "query")]
    Query(QueryArgs),
    /// Fetch candles, window them and write the dataset plus training plan
    #[command(name = "build")]
    Build(BuildArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MarketArgs {
    /// Trading pair as it appears in the trade table name
    #[arg(long, default_value = "btc_usdt")]
    pub pair: String,

    /// Exchange identifier prefixing the trade table name
    #[arg(long, default_value = DEFAULT_MARKET)]
    pub market: String,

    /// Schema holding the trade tables
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    pub schema: String,

    /// Time frame (Day, Hour, FifteenMinutes, TenMinutes, FiveMinute, Minute)
    #[arg(short = 'f', long = "frame", default_value = "FifteenMinutes")]
    pub frame: String,
}

impl MarketArgs {
    fn candle_query(&self) -> Result<CandleQuery> {
        let frame: TimeFrame = self.frame.parse()?;
        Ok(CandleQuery::new(self.pair.clone())
            .with_market(self.market.clone())
            .with_frame(frame)
            .with_schema(self.schema.clone()))
    }
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub market: MarketArgs,
}

impl QueryArgs {
    pub fn to_sql(&self) -> Result<String> {
        Ok(self.market.candle_query()?.to_sql())
    }
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub market: MarketArgs,

    /// DuckDB catalog holding the trade tables
    #[arg(
        short = 'd',
        long = "db",
        value_name = "FILE",
        default_value = "trades.duckdb",
        value_hint = clap::ValueHint::FilePath
    )]
    pub db: PathBuf,

    /// Read pre-aggregated candles from CSV instead of querying the database
    #[arg(long = "candles-csv", value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub candles_csv: Option<PathBuf>,

    /// Output directory for dataset.csv and training_plan.json
    #[arg(long = "output-dir", value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// Candles per window; the last one is the prediction target
    #[arg(long, default_value_t = DEFAULT_BARS)]
    pub bars: usize,

    /// Plan model fitting on GPU instead of CPU
    #[arg(short = 'g', long = "gpu", default_value_t = false)]
    pub gpu: bool,

    /// Boosting iterations per model
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Target columns to fit one model each on (comma-delimited)
    #[arg(long, value_enum, value_delimiter = ',', default_value = "low,high")]
    pub targets: Vec<TargetValue>,

    /// Log the query and stop before reading any candles
    #[arg(long = "dry-run", default_value_t = false)]
    pub dry_run: bool,

    /// Do not echo the candle query into the log
    #[arg(long = "quiet", default_value_t = false)]
    pub quiet: bool,

    /// Disable writing candlecast.log into the output directory
    #[arg(long = "no-file-log", default_value_t = false)]
    pub no_file_log: bool,
}

impl BuildArgs {
    pub fn into_config(self) -> Result<Config> {
        let query = self
            .market
            .candle_query()
            .context("Invalid --frame argument")?;
        if self.bars < 2 {
            anyhow::bail!("--bars must be at least 2 (got {})", self.bars);
        }
        let input = match self.candles_csv {
            Some(path) => CandleInput::Csv(path),
            None => CandleInput::Database(self.db),
        };
        Ok(Config {
            input,
            output_dir: self.output_dir,
            pair: query.pair,
            market: query.market,
            schema: query.schema,
            frame: query.frame,
            bars: self.bars,
            device: Device::from_gpu_flag(self.gpu),
            iterations: self.iterations,
            targets: self.targets.into_iter().map(TargetValue::to_field).collect(),
            dry_run: self.dry_run,
            quiet: self.quiet,
        })
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TargetValue {
    Open,
    Low,
    High,
    Close,
}

impl TargetValue {
    pub fn to_field(self) -> TargetField {
        match self {
            TargetValue::Open => TargetField::Open,
            TargetValue::Low => TargetField::Low,
            TargetValue::High => TargetField::High,
            TargetValue::Close => TargetField::Close,
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Cli as Parser>::parse()
    }
}
