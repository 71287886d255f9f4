//! Trade-to-chart alignment.
//!
//! Journals record trade times either in local time or in UTC, and broker
//! prices can sit on a different scale than the data feed. Both are resolved
//! once per trade from the first fetched window by matching the recorded
//! entry against the bars.

use replay_core::CandleBar;

/// How a trade's bars are mapped from raw feed data to display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentState {
    /// Added to every O/H/L/C.
    pub price_offset: f64,
    /// The trade's times are already in the chart's frame.
    pub is_local_time: bool,
    /// Local UTC offset in seconds, east positive.
    pub tz_offset_seconds: i64,
}

impl AlignmentState {
    /// No offset, no shift.
    pub fn identity() -> Self {
        Self {
            price_offset: 0.0,
            is_local_time: true,
            tz_offset_seconds: 0,
        }
    }

    /// Detect the alignment of `bars` against a trade entry.
    ///
    /// Every bar is compared against the entry taken as local time and as
    /// UTC; the closest match decides the frame, local winning ties. The
    /// price offset is only applied when that match is within `threshold`
    /// seconds and an entry price is known.
    pub fn detect(
        bars: &[CandleBar],
        entry_time: i64,
        entry_price: Option<f64>,
        tz_offset_seconds: i64,
        threshold: i64,
    ) -> Self {
        let mut best: Option<(&CandleBar, i64, bool)> = None;

        for bar in bars {
            let diff_local = (bar.time - entry_time).abs();
            if best.map_or(true, |(_, min, _)| diff_local < min) {
                best = Some((bar, diff_local, true));
            }
            let diff_utc = (bar.time - (entry_time + tz_offset_seconds)).abs();
            if best.map_or(true, |(_, min, _)| diff_utc < min) {
                best = Some((bar, diff_utc, false));
            }
        }

        let Some((matched, min_diff, is_local_time)) = best else {
            log::warn!("No bars to align trade entry {} against", entry_time);
            return Self::identity();
        };

        let price_offset = match entry_price {
            Some(price) if price != 0.0 && min_diff < threshold => price - matched.close,
            _ => {
                if min_diff >= threshold {
                    log::warn!(
                        "Closest bar is {}s from entry {}, skipping price offset",
                        min_diff,
                        entry_time
                    );
                }
                0.0
            }
        };

        log::debug!(
            "Aligned entry {}: offset {}, local {}, matched bar {}",
            entry_time,
            price_offset,
            is_local_time,
            matched.time
        );

        Self {
            price_offset,
            is_local_time,
            tz_offset_seconds,
        }
    }

    /// Seconds added to raw bar times for display.
    pub fn time_shift(&self) -> i64 {
        if self.is_local_time {
            0
        } else {
            self.tz_offset_seconds
        }
    }

    pub fn apply(&self, bar: &CandleBar) -> CandleBar {
        bar.offset_prices(self.price_offset).shift_time(self.time_shift())
    }

    pub fn apply_all(&self, bars: &[CandleBar]) -> Vec<CandleBar> {
        bars.iter().map(|bar| self.apply(bar)).collect()
    }

    /// Map a display time back to the feed's clock.
    pub fn to_raw_time(&self, display_time: i64) -> i64 {
        display_time - self.time_shift()
    }

    pub fn to_display_time(&self, raw_time: i64) -> i64 {
        raw_time + self.time_shift()
    }
}

impl Default for AlignmentState {
    fn default() -> Self {
        Self::identity()
    }
}

/// Offset of the machine's local timezone from UTC, in seconds.
pub fn local_tz_offset_seconds() -> i64 {
    i64::from(chrono::Local::now().offset().local_minus_utc())
}
