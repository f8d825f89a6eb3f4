use serde::{Deserialize, Serialize};

use crate::frame::TimeFrame;

pub const DEFAULT_MARKET: &str = "binance";
pub const DEFAULT_SCHEMA: &str = "fx";

/// Parameters of one candle aggregation query over a raw trade table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandleQuery {
    pub pair: String,
    pub market: String,
    pub frame: TimeFrame,
    pub schema: String,
}

impl CandleQuery {
    /// Query for `pair` on the default market and schema, bucketed hourly.
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            market: DEFAULT_MARKET.to_string(),
            frame: TimeFrame::default(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    pub fn with_frame(mut self, frame: TimeFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Fully-qualified trade table, `{schema}.{market}_{pair}_trades`.
    pub fn table_name(&self) -> String {
        format!("{}.{}_{}_trades", self.schema, self.market, self.pair)
    }

    pub fn to_sql(&self) -> String {
        build_candle_query(&self.pair, &self.market, self.frame, &self.schema)
    }
}

/// Build the OHLC aggregation query for one trade table.
///
/// Low/high are the bucket price extrema. Open and close are recovered by
/// re-joining the trade table on the minimum and maximum trade id of each
/// bucket, so they follow trade order rather than price. Rows come back as
/// `time, open, low, high, close` ordered by bucket start.
pub fn build_candle_query(pair: &str, market: &str, frame: TimeFrame, schema: &str) -> String {
    let table = format!("{schema}.{market}_{pair}_trades");
    let bucket = frame.truncation_function();
    format!(
        "SELECT t.tm AS time, a.price AS open, t.lp AS low, t.hp AS high, b.price AS close
    FROM (
        SELECT {bucket}(time) AS tm, MIN(price) AS lp, MAX(price) AS hp, MIN(id) AS lid, MAX(id) AS hid
            FROM {table} GROUP BY {bucket}(time)
    ) AS t
    INNER JOIN {table} AS a ON a.id = t.lid
    INNER JOIN {table} AS b ON b.id = t.hid
    ORDER BY t.tm"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_combines_schema_market_and_pair() {
        let query = CandleQuery::new("btc_usdt");
        assert_eq!(query.table_name(), "fx.binance_btc_usdt_trades");

        let query = CandleQuery::new("eth_btc")
            .with_market("kraken")
            .with_schema("ticks");
        assert_eq!(query.table_name(), "ticks.kraken_eth_btc_trades");
    }

    #[test]
    fn query_buckets_by_requested_frame() {
        let sql = build_candle_query("btc_usdt", "binance", TimeFrame::FifteenMinutes, "fx");
        assert_eq!(sql.matches("toStartOfFifteenMinutes(time)").count(), 2);
        assert!(!sql.contains("toStartOfHour"));
        assert!(sql.contains("FROM fx.binance_btc_usdt_trades GROUP BY"));
    }

    #[test]
    fn open_and_close_come_from_extreme_trade_ids() {
        let sql = CandleQuery::new("btc_usdt").to_sql();
        assert!(sql.contains("MIN(id) AS lid"));
        assert!(sql.contains("MAX(id) AS hid"));
        assert!(sql.contains("AS a ON a.id = t.lid"));
        assert!(sql.contains("AS b ON b.id = t.hid"));
        assert!(sql.contains("a.price AS open"));
        assert!(sql.contains("b.price AS close"));
        assert!(sql.trim_end().ends_with("ORDER BY t.tm"));
    }
}
