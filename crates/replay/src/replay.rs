//! Bar-by-bar replay of a trade's history.
//!
//! The ReplayController tracks whether the chart shows the full series
//! (live) or is cut at a cursor, and steps that cursor through the 1-minute
//! base series. Coarser viewports are re-aggregated from the cut base so the
//! newest bucket shows as a partial bar.

use replay_config::ReplayConfig;
use replay_core::{aggregate_candles, CandleBar, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Full series shown.
    #[default]
    Live,
    /// Series shown up to the cursor.
    Cut,
}

/// Manages replay cursor, mode and playback state.
#[derive(Debug, Clone)]
pub struct ReplayController {
    pub mode: ReplayMode,
    /// Time of the last visible base bar while cut.
    pub cursor_time: Option<i64>,
    pub playing: bool,
    /// Interval between playback steps.
    pub speed_ms: u64,
    min_speed_ms: u64,
    max_speed_ms: u64,
}

impl ReplayController {
    pub fn new(config: &ReplayConfig) -> Self {
        let min_speed_ms = config.min_speed_ms;
        let max_speed_ms = config.max_speed_ms.max(min_speed_ms);
        Self {
            mode: ReplayMode::Live,
            cursor_time: None,
            playing: false,
            speed_ms: config.default_speed_ms.clamp(min_speed_ms, max_speed_ms),
            min_speed_ms,
            max_speed_ms,
        }
    }

    pub fn is_cut(&self) -> bool {
        self.mode == ReplayMode::Cut
    }

    /// Cut the chart at `time`.
    pub fn cut(&mut self, time: i64) {
        self.mode = ReplayMode::Cut;
        self.cursor_time = Some(time);
    }

    /// Show the full series again. Stops playback.
    pub fn go_live(&mut self) {
        self.mode = ReplayMode::Live;
        self.cursor_time = None;
        self.playing = false;
    }

    /// Advance the cursor to the next base bar.
    ///
    /// Without a cursor this starts at the first bar. Returns true if the
    /// cursor moved.
    pub fn step_forward(&mut self, base: &[CandleBar]) -> bool {
        let Some(first) = base.first() else {
            return false;
        };

        let next = match self.cursor_time {
            None => Some(first.time),
            Some(cursor) => {
                let idx = base.partition_point(|bar| bar.time <= cursor);
                base.get(idx).map(|bar| bar.time)
            }
        };

        match next {
            Some(time) => {
                self.cut(time);
                true
            }
            None => false,
        }
    }

    /// Move the cursor to the previous base bar. Returns true if it moved.
    pub fn step_backward(&mut self, base: &[CandleBar]) -> bool {
        let Some(cursor) = self.cursor_time else {
            return false;
        };

        let idx = base.partition_point(|bar| bar.time < cursor);
        if idx == 0 {
            return false;
        }
        self.cut(base[idx - 1].time);
        true
    }

    /// Start playback. Only possible while cut.
    pub fn play(&mut self) -> bool {
        if !self.is_cut() {
            return false;
        }
        self.playing = true;
        true
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Set the playback interval, clamped to the allowed range.
    pub fn set_speed(&mut self, speed_ms: u64) -> u64 {
        self.speed_ms = speed_ms.clamp(self.min_speed_ms, self.max_speed_ms);
        self.speed_ms
    }

    /// One playback step. Stops playback when the last bar is reached.
    ///
    /// Returns true if the cursor moved.
    pub fn tick(&mut self, base: &[CandleBar]) -> bool {
        if !self.playing {
            return false;
        }
        let moved = self.step_forward(base);
        if !moved || self.is_at_end(base) {
            self.playing = false;
        }
        moved
    }

    /// Whether the cursor sits on the last base bar.
    pub fn is_at_end(&self, base: &[CandleBar]) -> bool {
        match (self.cursor_time, base.last()) {
            (Some(cursor), Some(last)) => cursor >= last.time,
            _ => false,
        }
    }

    /// Base bars visible under the current mode.
    pub fn visible_bars<'a>(&self, base: &'a [CandleBar]) -> &'a [CandleBar] {
        match (self.mode, self.cursor_time) {
            (ReplayMode::Cut, Some(cursor)) => {
                let end = base.partition_point(|bar| bar.time <= cursor);
                &base[..end]
            }
            _ => base,
        }
    }

    /// Bars to display on a viewport of `timeframe`: cut first, then aggregated.
    pub fn display_bars(&self, base: &[CandleBar], timeframe: Timeframe) -> Vec<CandleBar> {
        aggregate_candles(self.visible_bars(base), timeframe)
    }
}

impl Default for ReplayController {
    fn default() -> Self {
        Self::new(&ReplayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars() -> Vec<CandleBar> {
        vec![
            CandleBar {
                time: 1000,
                open: 100.0,
                high: 110.0,
                low: 90.0,
                close: 105.0,
                volume: None,
            },
            CandleBar {
                time: 1060,
                open: 105.0,
                high: 115.0,
                low: 100.0,
                close: 110.0,
                volume: None,
            },
            CandleBar {
                time: 1120,
                open: 110.0,
                high: 112.0,
                low: 95.0,
                close: 96.0,
                volume: None,
            },
        ]
    }

    #[test]
    fn test_controller_new() {
        let controller = ReplayController::default();
        assert_eq!(controller.mode, ReplayMode::Live);
        assert!(controller.cursor_time.is_none());
        assert!(!controller.playing);
        assert_eq!(controller.speed_ms, 1000);
    }

    #[test]
    fn test_step_forward_from_start() {
        let mut controller = ReplayController::default();
        assert!(controller.step_forward(&bars()));
        assert_eq!(controller.mode, ReplayMode::Cut);
        assert_eq!(controller.cursor_time, Some(1000));

        assert!(controller.step_forward(&bars()));
        assert_eq!(controller.cursor_time, Some(1060));
    }

    #[test]
    fn test_step_forward_at_end_is_noop() {
        let mut controller = ReplayController::default();
        controller.cut(1120);
        assert!(!controller.step_forward(&bars()));
        assert_eq!(controller.cursor_time, Some(1120));
    }

    #[test]
    fn test_step_forward_between_bars() {
        let mut controller = ReplayController::default();
        controller.cut(1030);
        assert!(controller.step_forward(&bars()));
        assert_eq!(controller.cursor_time, Some(1060));
    }

    #[test]
    fn test_step_backward() {
        let mut controller = ReplayController::default();
        controller.cut(1060);
        assert!(controller.step_backward(&bars()));
        assert_eq!(controller.cursor_time, Some(1000));

        // First bar
        assert!(!controller.step_backward(&bars()));
        assert_eq!(controller.cursor_time, Some(1000));
    }

    #[test]
    fn test_step_empty_series() {
        let mut controller = ReplayController::default();
        assert!(!controller.step_forward(&[]));
        assert!(!controller.step_backward(&[]));
        assert_eq!(controller.mode, ReplayMode::Live);
    }

    #[test]
    fn test_play_requires_cut() {
        let mut controller = ReplayController::default();
        assert!(!controller.play());
        assert!(!controller.playing);

        controller.cut(1000);
        assert!(controller.play());
        controller.go_live();
        assert!(!controller.playing);
        assert!(controller.cursor_time.is_none());
    }

    #[test]
    fn test_play_auto_stops_at_end() {
        let mut controller = ReplayController::default();
        let bars = bars();
        controller.cut(1000);
        controller.play();

        assert!(controller.tick(&bars));
        assert!(controller.playing);
        assert!(controller.tick(&bars));
        assert_eq!(controller.cursor_time, Some(1120));
        assert!(!controller.playing);

        assert!(!controller.tick(&bars));
    }

    #[test]
    fn test_set_speed_clamps() {
        let mut controller = ReplayController::default();
        assert_eq!(controller.set_speed(10), 100);
        assert_eq!(controller.set_speed(10_000), 3000);
        assert_eq!(controller.set_speed(500), 500);
    }

    #[test]
    fn test_visible_bars() {
        let mut controller = ReplayController::default();
        let bars = bars();
        assert_eq!(controller.visible_bars(&bars).len(), 3);

        controller.cut(1060);
        assert_eq!(controller.visible_bars(&bars).len(), 2);

        controller.cut(999);
        assert!(controller.visible_bars(&bars).is_empty());
    }

    #[test]
    fn test_display_bars_partial_bucket() {
        let mut controller = ReplayController::default();
        let bars = bars();
        controller.cut(1060);

        // All three bars fall in the 900 bucket
        let shown = controller.display_bars(&bars, Timeframe::Min5);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].time, 900);
        assert_eq!(shown[0].close, 110.0);
        assert_eq!(shown[0].high, 115.0);

        controller.cut(1120);
        let shown = controller.display_bars(&bars, Timeframe::Min5);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].open, 100.0);
        assert_eq!(shown[0].close, 96.0);
    }
}
