//! Trades and the collaborators a replay session talks to.
//!
//! The journal owns trades; the session only reads them and writes back its
//! saved view and drawings. Charts are driven through [`ChartSurface`] so
//! the same session can feed any rendering engine.

use async_trait::async_trait;
use replay_core::{CandleBar, Timeframe};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drawing::DrawingObject;

/// Inclusive time range in display seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn span(&self) -> i64 {
        self.to - self.from
    }

    pub fn contains(&self, time: i64) -> bool {
        (self.from..=self.to).contains(&time)
    }
}

/// Saved mini-chart layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewLayout {
    #[default]
    Single,
    Split,
}

/// A journal trade as the replay sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub instrument: String,
    /// Exit time, unix seconds as recorded by the journal.
    pub exit_time: i64,
    pub duration_minutes: i64,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub drawings: Vec<DrawingObject>,
    #[serde(default)]
    pub mini_view_range: Option<TimeRange>,
    #[serde(default)]
    pub mini_view_secondary_range: Option<TimeRange>,
    #[serde(default)]
    pub mini_view_layout: Option<ViewLayout>,
    #[serde(default)]
    pub mini_view_secondary_timeframe: Option<Timeframe>,
}

impl Trade {
    pub fn new(id: impl Into<String>, instrument: impl Into<String>, exit_time: i64) -> Self {
        Self {
            id: id.into(),
            instrument: instrument.into(),
            exit_time,
            duration_minutes: 0,
            entry_price: None,
            exit_price: None,
            drawings: Vec::new(),
            mini_view_range: None,
            mini_view_secondary_range: None,
            mini_view_layout: None,
            mini_view_secondary_timeframe: None,
        }
    }

    /// Entry time derived from exit time and duration.
    pub fn entry_time(&self) -> i64 {
        self.exit_time - self.duration_minutes * 60
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration_minutes * 60
    }
}

/// One field of a partial trade update.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    pub fn apply(self, target: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *target = Some(value),
            Patch::Clear => *target = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// Partial update of a trade's saved view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradePatch {
    pub mini_view_range: Patch<TimeRange>,
    pub mini_view_secondary_range: Patch<TimeRange>,
    pub mini_view_layout: Patch<ViewLayout>,
    pub mini_view_secondary_timeframe: Patch<Timeframe>,
}

impl TradePatch {
    /// Apply every non-`Keep` field to `trade`.
    pub fn apply_to(self, trade: &mut Trade) {
        self.mini_view_range.apply(&mut trade.mini_view_range);
        self.mini_view_secondary_range
            .apply(&mut trade.mini_view_secondary_range);
        self.mini_view_layout.apply(&mut trade.mini_view_layout);
        self.mini_view_secondary_timeframe
            .apply(&mut trade.mini_view_secondary_timeframe);
    }

    pub fn is_empty(&self) -> bool {
        self.mini_view_range.is_keep()
            && self.mini_view_secondary_range.is_keep()
            && self.mini_view_layout.is_keep()
            && self.mini_view_secondary_timeframe.is_keep()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trade {0} not found")]
    NotFound(String),
    #[error("trade store error: {0}")]
    Backend(String),
}

/// Durable trade storage.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn get_trade(&self, id: &str) -> Result<Trade, StoreError>;

    async fn update_trade(&self, id: &str, patch: TradePatch) -> Result<(), StoreError>;

    /// Replace the trade's drawings. Must be idempotent.
    async fn update_trade_drawings(
        &self,
        id: &str,
        drawings: &[DrawingObject],
    ) -> Result<(), StoreError>;
}

/// A chart the session renders into.
pub trait ChartSurface: Send {
    fn set_data(&mut self, bars: &[CandleBar]);

    /// Currently visible time range, if the chart has been laid out.
    fn visible_range(&self) -> Option<TimeRange>;

    fn set_visible_range(&mut self, range: TimeRange);
}
