use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candles::{CandleTable, PRICE_COLUMNS};
use crate::mask::{alignment_mask, elapsed_buckets};

pub const DEFAULT_BARS: usize = 3;

/// Values each candle contributes to a window: open, low, high, close.
const FIELDS_PER_BAR: usize = 4;
const CLOSE_OFFSET: usize = 3;

/// Dense row-major matrix of f64 values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn with_capacity(cols: usize, rows: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::with_capacity(cols * rows),
        }
    }

    fn push_row(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.cols);
        self.data.extend_from_slice(values);
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).filter_map(|index| self.row(index))
    }

    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.cols {
            return None;
        }
        Some(self.iter_rows().map(|row| row[index]).collect())
    }

    /// Row-major backing storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// One of the four prices of the predicted candle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Open,
    Low,
    High,
    Close,
}

impl TargetField {
    /// Column of this field in the targets matrix.
    pub fn index(self) -> usize {
        match self {
            TargetField::Open => 0,
            TargetField::Low => 1,
            TargetField::High => 2,
            TargetField::Close => 3,
        }
    }

    pub fn name(self) -> &'static str {
        PRICE_COLUMNS[self.index()]
    }
}

/// Window bookkeeping gathered while building a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub candles: usize,
    pub windows: usize,
    pub kept: usize,
    pub misaligned: usize,
}

/// Anchor-relative features and targets, row aligned.
#[derive(Debug, Clone)]
pub struct Dataset {
    bars: usize,
    features: Matrix,
    targets: Matrix,
    anchors: Vec<f64>,
    window_starts: Vec<usize>,
    stats: WindowStats,
}

impl Dataset {
    pub fn bars(&self) -> usize {
        self.bars
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn targets(&self) -> &Matrix {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.features.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Absolute anchor close of each row.
    pub fn anchors(&self) -> &[f64] {
        &self.anchors
    }

    /// Index of the first candle of each row's window in the source table.
    pub fn window_starts(&self) -> &[usize] {
        &self.window_starts
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    pub fn target_column(&self, field: TargetField) -> Vec<f64> {
        self.targets.column(field.index()).unwrap_or_default()
    }

    /// Absolute OHLC prices of the whole window behind row `index`, in
    /// candle order, with the withheld anchor close restored.
    pub fn reconstruct_row(&self, index: usize) -> Option<Vec<f64>> {
        let features = self.features.row(index)?;
        let targets = self.targets.row(index)?;
        let anchor = self.anchors[index];
        let mut out = Vec::with_capacity(FIELDS_PER_BAR * self.bars);
        out.extend(features.iter().map(|value| value + anchor));
        out.push(anchor);
        out.extend(targets.iter().map(|value| value + anchor));
        Some(out)
    }

    pub fn feature_names(&self) -> Vec<String> {
        feature_column_names(self.bars)
    }

    pub fn target_names(&self) -> Vec<String> {
        target_column_names()
    }

    /// Features followed by targets, one named column each.
    pub fn to_data_frame(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.features.cols() + self.targets.cols());
        for (index, name) in self.feature_names().iter().enumerate() {
            let values = self.features.column(index).unwrap_or_default();
            columns.push(Series::new(name, values));
        }
        for (index, name) in self.target_names().iter().enumerate() {
            let values = self.targets.column(index).unwrap_or_default();
            columns.push(Series::new(name, values));
        }
        DataFrame::new(columns).context("Failed to assemble dataset frame")
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut frame = self.to_data_frame()?;
        let mut file =
            File::create(path).with_context(|| format!("Unable to create {}", path.display()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)
            .with_context(|| format!("Failed to write dataset to {}", path.display()))
    }
}

/// `open_0, low_0, high_0, close_0, ..., open_{k-2}, low_{k-2}, high_{k-2}`.
pub fn feature_column_names(bars: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(feature_width(bars));
    for bar in 0..bars.saturating_sub(1) {
        for field in PRICE_COLUMNS {
            names.push(format!("{field}_{bar}"));
        }
    }
    names.truncate(feature_width(bars));
    names
}

pub fn target_column_names() -> Vec<String> {
    PRICE_COLUMNS
        .iter()
        .map(|field| format!("target_{field}"))
        .collect()
}

/// Number of feature columns for windows of `bars` candles.
pub fn feature_width(bars: usize) -> usize {
    (FIELDS_PER_BAR * bars.saturating_sub(1)).saturating_sub(1)
}

/// Column of the anchor close within a raw window row.
fn anchor_column(bars: usize) -> usize {
    FIELDS_PER_BAR * (bars - 2) + CLOSE_OFFSET
}

/// Turn a candle table into anchor-relative `(features, targets)` rows.
///
/// Every window of `bars` consecutive candles whose timestamps are exactly
/// one `bucket` apart becomes one row. Prices are made relative to the close
/// of the second-to-last candle; features keep every price of the first
/// `bars - 1` candles except that close, targets are the final candle.
/// Windows spanning a gap or a duplicated bucket are dropped. Fewer candles
/// than `bars` yields an empty dataset.
///
/// Fails when `bars < 2` or `bucket` is not strictly positive.
pub fn build_dataset(table: &CandleTable, bucket: Duration, bars: usize) -> Result<Dataset> {
    if bars < 2 {
        bail!("A window needs at least 2 bars (got {bars})");
    }
    let elapsed = elapsed_buckets(table.time(), bucket)?;
    let mask = alignment_mask(&elapsed, bars);

    let width = FIELDS_PER_BAR * bars;
    let n_features = feature_width(bars);
    let anchor_at = anchor_column(bars);
    let kept = mask.iter().filter(|ok| **ok).count();

    let mut features = Matrix::with_capacity(n_features, kept);
    let mut targets = Matrix::with_capacity(FIELDS_PER_BAR, kept);
    let mut anchors = Vec::with_capacity(kept);
    let mut window_starts = Vec::with_capacity(kept);
    let mut window = vec![0.0; width];

    for (start, valid) in mask.iter().enumerate() {
        if !valid {
            continue;
        }
        for offset in 0..bars {
            let row = start + offset;
            let slot = &mut window[offset * FIELDS_PER_BAR..(offset + 1) * FIELDS_PER_BAR];
            slot[0] = table.open()[row];
            slot[1] = table.low()[row];
            slot[2] = table.high()[row];
            slot[3] = table.close()[row];
        }
        let anchor = window[anchor_at];
        for value in window.iter_mut() {
            *value -= anchor;
        }
        features.push_row(&window[..n_features]);
        targets.push_row(&window[width - FIELDS_PER_BAR..]);
        anchors.push(anchor);
        window_starts.push(start);
    }

    let stats = WindowStats {
        candles: table.len(),
        windows: mask.len(),
        kept,
        misaligned: mask.len() - kept,
    };
    debug!(
        candles = stats.candles,
        windows = stats.windows,
        kept = stats.kept,
        misaligned = stats.misaligned,
        bars,
        "built windowed dataset"
    );

    Ok(Dataset {
        bars,
        features,
        targets,
        anchors,
        window_starts,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(closes: &[f64]) -> CandleTable {
        let n = closes.len();
        let time = (0..n as i64).map(|i| i * 3_600).collect();
        let open = closes.iter().map(|c| c - 0.5).collect();
        let low = closes.iter().map(|c| c - 1.0).collect();
        let high = closes.iter().map(|c| c + 1.0).collect();
        CandleTable::new(time, open, low, high, closes.to_vec()).unwrap()
    }

    #[test]
    fn column_names_follow_layout() {
        assert_eq!(
            feature_column_names(3),
            vec![
                "open_0", "low_0", "high_0", "close_0", "open_1", "low_1", "high_1"
            ]
        );
        assert_eq!(feature_column_names(2), vec!["open_0", "low_0", "high_0"]);
        assert_eq!(
            target_column_names(),
            vec!["target_open", "target_low", "target_high", "target_close"]
        );
    }

    #[test]
    fn single_window_matches_hand_computed_row() -> Result<()> {
        let table = hourly(&[100.0, 102.0, 105.0]);
        let dataset = build_dataset(&table, Duration::hours(1), 3)?;
        assert_eq!(dataset.len(), 1);
        // anchor = close of candle 1 = 102
        assert_eq!(dataset.anchors(), &[102.0]);
        assert_eq!(
            dataset.features().row(0).unwrap(),
            &[-2.5, -3.0, -1.0, -2.0, -0.5, -1.0, 1.0]
        );
        assert_eq!(dataset.targets().row(0).unwrap(), &[2.5, 2.0, 4.0, 3.0]);
        Ok(())
    }

    #[test]
    fn rejects_short_windows_and_bad_buckets() {
        let table = hourly(&[1.0, 2.0, 3.0]);
        assert!(build_dataset(&table, Duration::hours(1), 1).is_err());
        assert!(build_dataset(&table, Duration::hours(1), 0).is_err());
        assert!(build_dataset(&table, Duration::zero(), 3).is_err());
    }

    #[test]
    fn target_column_extracts_requested_field() -> Result<()> {
        let table = hourly(&[10.0, 11.0, 12.0, 13.0]);
        let dataset = build_dataset(&table, Duration::hours(1), 3)?;
        assert_eq!(dataset.target_column(TargetField::Low), vec![0.0, 0.0]);
        assert_eq!(dataset.target_column(TargetField::High), vec![2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn data_frame_carries_named_columns() -> Result<()> {
        let table = hourly(&[10.0, 11.0, 12.0, 13.0]);
        let dataset = build_dataset(&table, Duration::hours(1), 3)?;
        let frame = dataset.to_data_frame()?;
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.width(), 7 + 4);
        assert!(frame.column("high_1").is_ok());
        assert!(frame.column("target_close").is_ok());
        Ok(())
    }
}
