use anyhow::Result;
use candlecast_rs::{CandleQuery, CandleSource, DuckDbSource, TimeFrame, build_dataset};

fn seed_trades(source: &DuckDbSource, rows: &[(i64, &str, f64)]) -> Result<()> {
    let conn = source.connection();
    conn.execute_batch(
        "CREATE SCHEMA IF NOT EXISTS fx;
         CREATE TABLE fx.binance_btc_usdt_trades (id BIGINT, time TIMESTAMP, price DOUBLE);",
    )?;
    for &(id, time, price) in rows {
        conn.execute(
            "INSERT INTO fx.binance_btc_usdt_trades VALUES (?, CAST(? AS TIMESTAMP), ?)",
            duckdb::params![id, time, price],
        )?;
    }
    Ok(())
}

#[test]
fn open_and_close_follow_trade_order_not_price() -> Result<()> {
    let source = DuckDbSource::open_in_memory()?;
    seed_trades(
        &source,
        &[
            (5, "2024-01-01 10:05:00", 10.0),
            (6, "2024-01-01 10:20:00", 12.0),
            (7, "2024-01-01 10:50:00", 9.0),
        ],
    )?;

    let candles = source.fetch(&CandleQuery::new("btc_usdt"))?;
    assert_eq!(candles.len(), 1);
    let candle = candles.candle(0).expect("one bucket");
    assert_eq!(candle.open, 10.0);
    assert_eq!(candle.close, 9.0);
    assert_eq!(candle.low, 9.0);
    assert_eq!(candle.high, 12.0);
    assert_eq!(candle.time, 1_704_103_200);
    Ok(())
}

#[test]
fn buckets_are_ordered_and_gaps_left_in_place() -> Result<()> {
    let source = DuckDbSource::open_in_memory()?;
    // Ids deliberately do not follow insertion order of buckets.
    seed_trades(
        &source,
        &[
            (30, "2024-01-01 12:10:00", 103.0),
            (31, "2024-01-01 12:40:00", 104.0),
            (10, "2024-01-01 10:00:00", 100.0),
            (11, "2024-01-01 10:30:00", 101.0),
            (20, "2024-01-01 11:59:59", 102.0),
            (40, "2024-01-01 14:00:00", 105.0),
        ],
    )?;

    let query = CandleQuery::new("btc_usdt").with_frame(TimeFrame::Hour);
    let candles = source.fetch(&query)?;
    let hours: Vec<i64> = candles
        .time()
        .iter()
        .map(|t| (t - candles.time()[0]) / 3_600)
        .collect();
    assert_eq!(hours, vec![0, 1, 2, 4]);
    assert_eq!(candles.open(), &[100.0, 102.0, 103.0, 105.0]);
    assert_eq!(candles.close(), &[101.0, 102.0, 104.0, 105.0]);

    // 10:00, 11:00, 12:00 are regular; 14:00 follows a missing hour.
    let dataset = build_dataset(&candles, query.frame.duration(), 3)?;
    assert_eq!(dataset.window_starts(), &[0]);
    Ok(())
}

#[test]
fn fifteen_minute_frame_buckets_on_quarter_hours() -> Result<()> {
    let source = DuckDbSource::open_in_memory()?;
    seed_trades(
        &source,
        &[
            (1, "2024-01-01 10:01:00", 1.0),
            (2, "2024-01-01 10:14:59", 2.0),
            (3, "2024-01-01 10:15:00", 3.0),
            (4, "2024-01-01 10:44:00", 4.0),
        ],
    )?;

    let query = CandleQuery::new("btc_usdt").with_frame(TimeFrame::FifteenMinutes);
    let candles = source.fetch(&query)?;
    let offsets: Vec<i64> = candles
        .time()
        .iter()
        .map(|t| t - candles.time()[0])
        .collect();
    assert_eq!(offsets, vec![0, 900, 1_800]);
    assert_eq!(candles.close(), &[2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn missing_trade_table_is_reported() -> Result<()> {
    let source = DuckDbSource::open_in_memory()?;
    let err = source
        .fetch(&CandleQuery::new("doge_usdt"))
        .expect_err("table does not exist");
    assert!(format!("{err:#}").contains("fx.binance_doge_usdt_trades"));
    Ok(())
}
