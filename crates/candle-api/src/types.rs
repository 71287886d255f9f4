//! Request and response types for the candle endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use replay_core::{CandleBar, Timeframe};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Parameters of one `GET /api/candles` request.
///
/// `from` and `to` are unix seconds and are sent as ISO-8601 UTC strings.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleQuery {
    pub instrument: String,
    pub from: i64,
    pub to: i64,
    pub timeframe: Timeframe,
    /// Only answer from the backend cache, never the upstream provider.
    pub cache_only: bool,
    /// Ask the backend to refetch upstream even when cached.
    pub force: bool,
}

impl CandleQuery {
    pub fn new(instrument: impl Into<String>, from: i64, to: i64, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            from,
            to,
            timeframe,
            cache_only: false,
            force: false,
        }
    }

    pub fn cache_only(mut self) -> Self {
        self.cache_only = true;
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Query string pairs in the order the endpoint documents them.
    pub fn query_pairs(&self) -> Result<Vec<(&'static str, String)>> {
        if self.from > self.to {
            return Err(Error::InvalidParameter(format!(
                "from ({}) is after to ({})",
                self.from, self.to
            )));
        }

        let mut pairs = vec![
            ("instrument", self.instrument.clone()),
            ("from", iso_timestamp(self.from)?),
            ("to", iso_timestamp(self.to)?),
            ("timeframe", self.timeframe.label().to_string()),
        ];
        if self.cache_only {
            pairs.push(("cacheOnly", "true".to_string()));
        }
        if self.force {
            pairs.push(("force", "true".to_string()));
        }
        Ok(pairs)
    }
}

/// Format unix seconds the way the backend expects (`2024-01-01T00:00:00.000Z`).
pub fn iso_timestamp(secs: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| Error::InvalidParameter(format!("timestamp out of range: {secs}")))
}

/// Candle as returned by the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCandle {
    /// Unix seconds. Some providers send fractional values.
    pub time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl From<WireCandle> for CandleBar {
    fn from(wire: WireCandle) -> Self {
        CandleBar {
            time: wire.time.floor() as i64,
            open: wire.open,
            high: wire.high,
            low: wire.low,
            close: wire.close,
            volume: wire.volume,
        }
    }
}

/// Error body returned on non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "error", alias = "message")]
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp() {
        assert_eq!(iso_timestamp(0).unwrap(), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            iso_timestamp(1_704_067_200).unwrap(),
            "2024-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_query_pairs_flags() {
        let query = CandleQuery::new("EURUSD", 0, 3600, Timeframe::Min1).cache_only();
        let pairs = query.query_pairs().unwrap();
        assert_eq!(pairs[0], ("instrument", "EURUSD".to_string()));
        assert_eq!(pairs[3], ("timeframe", "1m".to_string()));
        assert!(pairs.contains(&("cacheOnly", "true".to_string())));
        assert!(!pairs.iter().any(|(k, _)| *k == "force"));
    }

    #[test]
    fn test_query_rejects_inverted_window() {
        let query = CandleQuery::new("EURUSD", 100, 50, Timeframe::Min1);
        assert!(matches!(query.query_pairs(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_wire_candle_into_bar() {
        let wire: WireCandle =
            serde_json::from_str(r#"{"time":60.0,"open":1,"high":2,"low":0.5,"close":1.5}"#)
                .unwrap();
        let bar = CandleBar::from(wire);
        assert_eq!(bar, CandleBar::new(60, 1.0, 2.0, 0.5, 1.5));
    }
}
