//! Timeframe types and candle aggregation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::candle::CandleBar;

/// Chart timeframes offered by the replay viewports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m", alias = "m1")]
    Min1, // base data
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "D")]
    Day1,
    #[serde(rename = "W")]
    Week1,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::Min1 => 1,
            Timeframe::Min5 => 5,
            Timeframe::Min15 => 15,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
            Timeframe::Day1 => 1440,
            Timeframe::Week1 => 10080,
        }
    }

    /// Returns the duration of this timeframe in seconds.
    pub fn seconds(&self) -> i64 {
        self.minutes() * 60
    }

    /// Returns the short label used by the remote endpoint and the UI.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Min5 => "5m",
            Timeframe::Min15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "D",
            Timeframe::Week1 => "W",
        }
    }

    /// Returns all available timeframes in order.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Min1,
            Timeframe::Min5,
            Timeframe::Min15,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Day1,
            Timeframe::Week1,
        ]
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Min1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a timeframe label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeframeError(pub String);

impl fmt::Display for ParseTimeframeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown timeframe: {}", self.0)
    }
}

impl std::error::Error for ParseTimeframeError {}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" | "m1" => Ok(Timeframe::Min1),
            "5m" => Ok(Timeframe::Min5),
            "15m" => Ok(Timeframe::Min15),
            "1h" => Ok(Timeframe::Hour1),
            "4h" => Ok(Timeframe::Hour4),
            "D" | "1d" => Ok(Timeframe::Day1),
            "W" | "1w" => Ok(Timeframe::Week1),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}

/// Aggregate time-sorted bars into buckets of `timeframe_minutes`.
///
/// A one-minute (or smaller) timeframe returns the input unchanged.
pub fn aggregate(bars: &[CandleBar], timeframe_minutes: i64) -> Vec<CandleBar> {
    if timeframe_minutes <= 1 {
        return bars.to_vec();
    }

    let interval = timeframe_minutes * 60;
    let mut aggregated = Vec::new();
    let mut current_bucket: Option<CandleBar> = None;

    for bar in bars {
        let bucket_start = bar.time.div_euclid(interval) * interval;

        match current_bucket {
            Some(ref mut agg) if agg.time == bucket_start => {
                // Same bucket - widen the envelope and carry the close forward
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume = match (agg.volume, bar.volume) {
                    (None, None) => None,
                    (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
                };
            }
            _ => {
                if let Some(agg) = current_bucket.take() {
                    aggregated.push(agg);
                }
                current_bucket = Some(CandleBar {
                    time: bucket_start,
                    ..*bar
                });
            }
        }
    }

    // Don't forget the last bucket
    if let Some(agg) = current_bucket {
        aggregated.push(agg);
    }

    aggregated
}

/// Aggregate bars into a larger [`Timeframe`].
pub fn aggregate_candles(bars: &[CandleBar], timeframe: Timeframe) -> Vec<CandleBar> {
    aggregate(bars, timeframe.minutes())
}
