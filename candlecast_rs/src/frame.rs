use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Bucket granularity used both for trade aggregation and for validating
/// that consecutive candles are exactly one bucket apart.
///
/// Variant names double as the suffix of the store's truncation function
/// family (`toStartOfHour`, `toStartOfFifteenMinutes`, ...), so they are kept
/// verbatim rather than normalised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TimeFrame {
    Day,
    #[default]
    Hour,
    FifteenMinutes,
    TenMinutes,
    FiveMinute,
    Minute,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 6] = [
        TimeFrame::Day,
        TimeFrame::Hour,
        TimeFrame::FifteenMinutes,
        TimeFrame::TenMinutes,
        TimeFrame::FiveMinute,
        TimeFrame::Minute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeFrame::Day => "Day",
            TimeFrame::Hour => "Hour",
            TimeFrame::FifteenMinutes => "FifteenMinutes",
            TimeFrame::TenMinutes => "TenMinutes",
            TimeFrame::FiveMinute => "FiveMinute",
            TimeFrame::Minute => "Minute",
        }
    }

    /// Exact width of one bucket.
    pub fn duration(self) -> Duration {
        match self {
            TimeFrame::Day => Duration::hours(24),
            TimeFrame::Hour => Duration::hours(1),
            TimeFrame::FifteenMinutes => Duration::minutes(15),
            TimeFrame::TenMinutes => Duration::minutes(10),
            TimeFrame::FiveMinute => Duration::minutes(5),
            TimeFrame::Minute => Duration::minutes(1),
        }
    }

    /// Name of the store function truncating a timestamp to the start of its
    /// bucket.
    pub fn truncation_function(self) -> String {
        format!("toStartOf{}", self.name())
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeFrame {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        TimeFrame::ALL
            .iter()
            .copied()
            .find(|frame| frame.name() == raw)
            .ok_or_else(|| {
                let names: Vec<&str> = TimeFrame::ALL.iter().map(|f| f.name()).collect();
                anyhow!(
                    "Unknown time frame '{raw}'. Supported frames: {}",
                    names.join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_match_bucket_widths() {
        assert_eq!(TimeFrame::Day.duration().num_seconds(), 86_400);
        assert_eq!(TimeFrame::Hour.duration().num_seconds(), 3_600);
        assert_eq!(TimeFrame::FifteenMinutes.duration().num_seconds(), 900);
        assert_eq!(TimeFrame::TenMinutes.duration().num_seconds(), 600);
        assert_eq!(TimeFrame::FiveMinute.duration().num_seconds(), 300);
        assert_eq!(TimeFrame::Minute.duration().num_seconds(), 60);
    }

    #[test]
    fn parses_every_name_and_rejects_unknown() {
        for frame in TimeFrame::ALL {
            assert_eq!(frame.name().parse::<TimeFrame>().unwrap(), frame);
        }
        let err = "Week".parse::<TimeFrame>().expect_err("Week is not a frame");
        let msg = format!("{err}");
        assert!(msg.contains("Week"));
        assert!(msg.contains("FifteenMinutes"));
    }

    #[test]
    fn truncation_function_follows_frame_name() {
        assert_eq!(TimeFrame::Hour.truncation_function(), "toStartOfHour");
        assert_eq!(
            TimeFrame::FiveMinute.truncation_function(),
            "toStartOfFiveMinute"
        );
    }
}
