//! Viewport geometry: go-to-trade ranges, backfill triggers and snapping.

use replay_config::ReplayConfig;
use replay_core::{CandleBar, Ohlc, Timeframe};

use crate::alignment::AlignmentState;
use crate::drawing::DrawingPoint;
use crate::trade::{TimeRange, Trade};

const DAY: i64 = 86_400;

/// The two chart panes of a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportId {
    Main,
    Secondary,
}

/// Visible range that frames a trade: an hour before entry to a buffer after
/// exit that grows with the trade's duration.
pub fn trade_range(trade: &Trade, alignment: &AlignmentState, config: &ReplayConfig) -> TimeRange {
    let entry = alignment.to_display_time(trade.entry_time());
    let exit = alignment.to_display_time(trade.exit_time);
    let lag = config
        .go_to_trade_min_lag_secs
        .max(trade.duration_secs() * config.go_to_trade_duration_multiple);
    TimeRange::new(entry - config.go_to_trade_lead_secs, exit + lag)
}

/// Range a viewport jumps to on go-to-trade. A saved range wins.
pub fn go_to_trade_range(
    viewport: ViewportId,
    trade: &Trade,
    alignment: &AlignmentState,
    config: &ReplayConfig,
) -> TimeRange {
    let saved = match viewport {
        ViewportId::Main => trade.mini_view_range,
        ViewportId::Secondary => trade.mini_view_secondary_range,
    };
    saved.unwrap_or_else(|| trade_range(trade, alignment, config))
}

/// Raw fetch window loaded when a trade opens, around its exit.
pub fn initial_fetch_window(exit_time: i64, timeframe: Timeframe) -> (i64, i64) {
    let exit = exit_time.div_euclid(60) * 60;
    let days_before = match timeframe {
        Timeframe::Min1 | Timeframe::Min5 => 1,
        _ => 3,
    };
    (exit - days_before * DAY, exit + DAY)
}

/// Whether the visible range has scrolled into the oldest part of the data.
pub fn should_backfill(range: TimeRange, bars: &[CandleBar], quartile: f64) -> bool {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return false;
    };
    let threshold = first.time as f64 + (last.time - first.time) as f64 * quartile;
    (range.from as f64) < threshold
}

/// Raw window to request before the oldest loaded bar.
pub fn backfill_window(first_raw_time: i64, lookback_secs: i64) -> (i64, i64) {
    let first = first_raw_time.div_euclid(60) * 60;
    (first - lookback_secs, first - 1)
}

/// Snap a point to the nearest bar within `tolerance_secs` and to the bar's
/// closest O/H/L/C. Points with no bar in reach are returned unchanged.
pub fn snap_point(point: DrawingPoint, bars: &[CandleBar], tolerance_secs: i64) -> DrawingPoint {
    let idx = bars.partition_point(|bar| bar.time < point.time);
    let before = idx.checked_sub(1).and_then(|i| bars.get(i));
    let after = bars.get(idx);

    let nearest = match (before, after) {
        (Some(b), Some(a)) => {
            if (point.time - b.time).abs() < (a.time - point.time).abs() {
                b
            } else {
                a
            }
        }
        (Some(bar), None) | (None, Some(bar)) => bar,
        (None, None) => return point,
    };

    if (nearest.time - point.time).abs() > tolerance_secs {
        return point;
    }
    DrawingPoint::new(nearest.time, nearest.closest_price(point.price))
}
