use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use polars::prelude::*;

pub const TIME_COLUMN: &str = "time";
pub const PRICE_COLUMNS: [&str; 4] = ["open", "low", "high", "close"];

/// One bucketed OHLC record. `time` is the bucket start in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub low: f64,
    pub high: f64,
    pub close: f64,
}

impl Candle {
    /// Prices in window column order: open, low, high, close.
    pub fn prices(&self) -> [f64; 4] {
        [self.open, self.low, self.high, self.close]
    }
}

/// Candles as index-aligned parallel arrays, the shape a columnar store
/// returns them in.
///
/// Rows are expected in ascending time order; out-of-order or duplicated
/// buckets are not rejected here, they simply fail the alignment check when
/// the table is windowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleTable {
    time: Vec<i64>,
    open: Vec<f64>,
    low: Vec<f64>,
    high: Vec<f64>,
    close: Vec<f64>,
}

impl CandleTable {
    pub fn new(
        time: Vec<i64>,
        open: Vec<f64>,
        low: Vec<f64>,
        high: Vec<f64>,
        close: Vec<f64>,
    ) -> Result<Self> {
        let len = time.len();
        for (name, other) in [
            ("open", open.len()),
            ("low", low.len()),
            ("high", high.len()),
            ("close", close.len()),
        ] {
            if other != len {
                return Err(anyhow!(
                    "Candle column '{name}' has {other} rows but 'time' has {len}"
                ));
            }
        }
        Ok(Self {
            time,
            open,
            low,
            high,
            close,
        })
    }

    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut table = Self::with_capacity(candles.len());
        for candle in candles {
            table.time.push(candle.time);
            table.open.push(candle.open);
            table.low.push(candle.low);
            table.high.push(candle.high);
            table.close.push(candle.close);
        }
        table
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            open: Vec::with_capacity(capacity),
            low: Vec::with_capacity(capacity),
            high: Vec::with_capacity(capacity),
            close: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[i64] {
        &self.time
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn candle(&self, index: usize) -> Option<Candle> {
        if index >= self.len() {
            return None;
        }
        Some(Candle {
            time: self.time[index],
            open: self.open[index],
            low: self.low[index],
            high: self.high[index],
            close: self.close[index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Candle> + '_ {
        (0..self.len()).filter_map(|index| self.candle(index))
    }

    /// Build a table from a frame carrying `time, open, low, high, close`.
    ///
    /// `time` may be integer epoch seconds, a polars datetime column, or
    /// RFC3339 strings. Nulls are rejected in every column.
    pub fn from_data_frame(frame: &DataFrame) -> Result<Self> {
        let time_series = frame
            .column(TIME_COLUMN)
            .with_context(|| format!("Missing required column '{TIME_COLUMN}'"))?;
        let time = epoch_seconds(time_series)?;

        let prices = |name: &str| -> Result<Vec<f64>> {
            let series = frame
                .column(name)
                .with_context(|| format!("Missing required column '{name}'"))?;
            price_values(series)
        };
        Self::new(
            time,
            prices("open")?,
            prices("low")?,
            prices("high")?,
            prices("close")?,
        )
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let frame = CsvReader::from_path(path)
            .with_context(|| format!("Failed to load {}", path.display()))?
            .infer_schema(Some(1024))
            .has_header(true)
            .finish()
            .with_context(|| format!("Unable to read {} into a DataFrame", path.display()))?;
        Self::from_data_frame(&frame)
            .with_context(|| format!("Invalid candle data in {}", path.display()))
    }
}

fn epoch_seconds(series: &Series) -> Result<Vec<i64>> {
    let mut out = Vec::with_capacity(series.len());
    match series.dtype() {
        DataType::Int64 | DataType::Int32 | DataType::UInt32 | DataType::UInt64 => {
            let cast = series
                .cast(&DataType::Int64)
                .context("Failed to cast time column to i64")?;
            for value in cast.i64().context("Time column must be integer")?.into_iter() {
                out.push(value.ok_or_else(|| anyhow!("Time column contains nulls"))?);
            }
        }
        DataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let ca = series
                .datetime()
                .context("Failed to interpret time column as datetime")?;
            for value in ca.into_iter() {
                let raw = value.ok_or_else(|| anyhow!("Time column contains nulls"))?;
                out.push(raw.div_euclid(per_second));
            }
        }
        DataType::String => {
            let ca = series.str().context("Failed to interpret time column as text")?;
            for value in ca.into_iter() {
                let raw = value.ok_or_else(|| anyhow!("Time column contains nulls"))?;
                let parsed = DateTime::parse_from_rfc3339(raw)
                    .with_context(|| format!("Failed to parse timestamp '{raw}' as RFC3339"))?;
                out.push(parsed.timestamp());
            }
        }
        other => {
            return Err(anyhow!(
                "Time column must be epoch seconds, datetime or RFC3339 text (got {other:?})"
            ));
        }
    }
    Ok(out)
}

fn price_values(series: &Series) -> Result<Vec<f64>> {
    let name = series.name().to_string();
    let cast = series
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{name}' is not numeric"))?;
    cast.f64()
        .with_context(|| format!("Column '{name}' must be float"))?
        .into_iter()
        .map(|value| value.ok_or_else(|| anyhow!("Column '{name}' contains nulls")))
        .collect()
}
