use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use duckdb::Connection;
use tracing::info;

use crate::candles::CandleTable;
use crate::frame::TimeFrame;
use crate::query::CandleQuery;

/// Anything able to execute a candle query and hand back the columnar
/// `time, open, low, high, close` result.
pub trait CandleSource {
    fn fetch(&self, query: &CandleQuery) -> Result<CandleTable>;
}

/// Trade store backed by a DuckDB catalog.
///
/// The candle query is written against the `toStartOf{Frame}` truncation
/// family; DuckDB has no such functions, so each one is registered as a
/// temporary macro when the connection is opened and the query runs
/// unchanged.
pub struct DuckDbSource {
    conn: Connection,
}

impl DuckDbSource {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Unable to open {}", path.display()))?;
        info!(db_path = %path.display(), "DuckDbSource opened DuckDB connection");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Unable to open in-memory DuckDB")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        for frame in TimeFrame::ALL {
            let sql = format!(
                "CREATE OR REPLACE TEMP MACRO {}(t) AS {}",
                frame.truncation_function(),
                bucket_expression(frame)
            );
            conn.execute_batch(&sql)
                .with_context(|| format!("Failed to register {}", frame.truncation_function()))?;
        }
        Ok(Self { conn })
    }

    /// Direct access for loading or inspecting trade tables.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn bucket_expression(frame: TimeFrame) -> &'static str {
    match frame {
        TimeFrame::Day => "date_trunc('day', t)",
        TimeFrame::Hour => "date_trunc('hour', t)",
        TimeFrame::FifteenMinutes => "time_bucket(INTERVAL 15 MINUTE, t)",
        TimeFrame::TenMinutes => "time_bucket(INTERVAL 10 MINUTE, t)",
        TimeFrame::FiveMinute => "time_bucket(INTERVAL 5 MINUTE, t)",
        TimeFrame::Minute => "date_trunc('minute', t)",
    }
}

impl CandleSource for DuckDbSource {
    fn fetch(&self, query: &CandleQuery) -> Result<CandleTable> {
        let started = Instant::now();
        // Bucket starts come back as timestamps; the table stores epoch seconds.
        let sql = format!(
            "SELECT CAST(epoch(time) AS BIGINT), open, low, high, close FROM ({}) AS candles ORDER BY 1",
            query.to_sql()
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare candle query for {}", query.table_name()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .with_context(|| format!("Candle query failed for {}", query.table_name()))?;

        let (mut time, mut open, mut low, mut high, mut close) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for row in rows {
            let (t, o, l, h, c) = row.context("Failed to decode candle row")?;
            time.push(t);
            open.push(o);
            low.push(l);
            high.push(h);
            close.push(c);
        }
        info!(
            table = %query.table_name(),
            frame = %query.frame,
            candles = time.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched candles"
        );
        CandleTable::new(time, open, low, high, close)
    }
}

/// Pre-aggregated candles stored as CSV. The query only labels the log line;
/// the file is expected to already hold candles for the requested frame.
pub struct CsvCandleSource {
    path: PathBuf,
}

impl CsvCandleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CandleSource for CsvCandleSource {
    fn fetch(&self, query: &CandleQuery) -> Result<CandleTable> {
        let table = CandleTable::load_csv(&self.path)?;
        info!(
            csv = %self.path.display(),
            frame = %query.frame,
            candles = table.len(),
            "loaded candles from CSV"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_truncation_macros() -> Result<()> {
        let source = DuckDbSource::open_in_memory()?;
        let bucket: String = source.connection().query_row(
            "SELECT CAST(toStartOfFifteenMinutes(TIMESTAMP '2024-01-01 10:44:59') AS VARCHAR)",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(bucket, "2024-01-01 10:30:00");

        let bucket: String = source.connection().query_row(
            "SELECT CAST(toStartOfDay(TIMESTAMP '2024-01-01 10:44:59') AS VARCHAR)",
            [],
            |row| row.get(0),
        )?;
        assert!(bucket.starts_with("2024-01-01"));
        Ok(())
    }
}
