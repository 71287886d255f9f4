//! Candle bar data structures.

use serde::{Deserialize, Serialize};

/// One OHLC price sample for a fixed time bucket.
///
/// `time` is the bucket start in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleBar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl CandleBar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    /// Attach a traded volume to the bar.
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Returns a copy with `offset` added to every price field.
    pub fn offset_prices(&self, offset: f64) -> Self {
        Self {
            open: self.open + offset,
            high: self.high + offset,
            low: self.low + offset,
            close: self.close + offset,
            ..*self
        }
    }

    /// Returns a copy moved by `seconds` on the time axis.
    pub fn shift_time(&self, seconds: i64) -> Self {
        Self {
            time: self.time + seconds,
            ..*self
        }
    }
}

/// Trait for types that provide OHLC prices.
pub trait Ohlc {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    /// The four prices in O/H/L/C order.
    fn prices(&self) -> [f64; 4] {
        [self.open(), self.high(), self.low(), self.close()]
    }

    /// The O/H/L/C price closest to `price`.
    fn closest_price(&self, price: f64) -> f64 {
        self.prices()
            .into_iter()
            .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))
            .unwrap_or(price)
    }
}

impl Ohlc for CandleBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }
}

/// Validate a bar has finite prices and a consistent high/low envelope.
pub fn validate_bar(bar: &CandleBar) -> bool {
    bar.open.is_finite()
        && bar.high.is_finite()
        && bar.low.is_finite()
        && bar.close.is_finite()
        && bar.high >= bar.open.max(bar.close)
        && bar.low <= bar.open.min(bar.close)
        && bar.volume.map_or(true, |v| v.is_finite() && v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_prices() {
        let bar = CandleBar::new(60, 98.0, 99.0, 97.0, 98.5).offset_prices(2.0);
        assert_eq!(bar.time, 60);
        assert_eq!(bar.prices(), [100.0, 101.0, 99.0, 100.5]);
    }

    #[test]
    fn test_closest_price() {
        let bar = CandleBar::new(0, 10.0, 14.0, 8.0, 12.0);
        assert_eq!(bar.closest_price(13.5), 14.0);
        assert_eq!(bar.closest_price(9.2), 10.0);
        assert_eq!(bar.closest_price(7.0), 8.0);
    }

    #[test]
    fn test_validate_bar() {
        assert!(validate_bar(&CandleBar::new(0, 100.0, 105.0, 95.0, 102.0)));
        assert!(!validate_bar(&CandleBar::new(0, 100.0, 99.0, 95.0, 102.0)));
        assert!(!validate_bar(&CandleBar::new(0, f64::NAN, 105.0, 95.0, 102.0)));
        assert!(!validate_bar(
            &CandleBar::new(0, 100.0, 105.0, 95.0, 102.0).with_volume(-1.0)
        ));
    }

    #[test]
    fn test_deserialize_without_volume() {
        let bar: CandleBar =
            serde_json::from_str(r#"{"time":60,"open":1.0,"high":2.0,"low":0.5,"close":1.5}"#)
                .unwrap();
        assert_eq!(bar, CandleBar::new(60, 1.0, 2.0, 0.5, 1.5));
    }
}
